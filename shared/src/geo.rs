use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build from a GeoJSON position, which is `[longitude, latitude, ...]`.
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [longitude, latitude, ..] if latitude.is_finite() && longitude.is_finite() => {
                Some(Self::new(*latitude, *longitude))
            }
            _ => None,
        }
    }

    /// True when either axis differs by more than `degrees`.
    pub fn differs_from(&self, other: &Coordinate, degrees: f64) -> bool {
        (self.latitude - other.latitude).abs() > degrees
            || (self.longitude - other.longitude).abs() > degrees
    }
}

/// Ordered boundary points; may be open or closed.
pub type Ring = Vec<Coordinate>;

/// Axis-aligned lat/lon box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Bounds {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        for point in &points[1..] {
            bounds.south = bounds.south.min(point.latitude);
            bounds.north = bounds.north.max(point.latitude);
            bounds.west = bounds.west.min(point.longitude);
            bounds.east = bounds.east.max(point.longitude);
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bounds, Coordinate};

    #[test]
    fn from_position_swaps_geojson_axis_order() {
        let c = Coordinate::from_position(&[-119.77, 36.74]).expect("valid position");
        assert_eq!(c, Coordinate::new(36.74, -119.77));
        assert!(Coordinate::from_position(&[1.0]).is_none());
        assert!(Coordinate::from_position(&[f64::NAN, 1.0]).is_none());
    }

    #[test]
    fn differs_from_uses_per_axis_threshold() {
        let a = Coordinate::new(36.0, -119.0);
        assert!(!a.differs_from(&Coordinate::new(36.005, -119.005), 0.01));
        assert!(a.differs_from(&Coordinate::new(36.02, -119.0), 0.01));
        assert!(a.differs_from(&Coordinate::new(36.0, -119.5), 0.01));
    }

    #[test]
    fn bounds_cover_all_points() {
        let ring = vec![
            Coordinate::new(36.0, -120.0),
            Coordinate::new(37.0, -119.5),
            Coordinate::new(36.5, -121.0),
        ];
        let bounds = Bounds::from_points(&ring).expect("non-empty ring");
        assert_eq!(bounds.south, 36.0);
        assert_eq!(bounds.north, 37.0);
        assert_eq!(bounds.west, -121.0);
        assert_eq!(bounds.east, -119.5);
        assert!(Bounds::from_points(&[]).is_none());
    }
}
