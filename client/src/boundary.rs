use std::sync::Arc;

use checkpoint_shared::{Bounds, CheckpointRecord, Coordinate, Ring};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{BoundaryCache, BoundaryEntry, KeyedLocks, boundary_key};
use crate::config::LocatorConfig;
use crate::geocoder::{GeocodeQuery, Geocoder, search_or_none};

/// Shape drawn around the selected record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BoundaryOverlay {
    Polygon { ring: Ring, bounds: Bounds },
    Circle { center: Coordinate, radius_meters: f64 },
}

impl BoundaryOverlay {
    pub fn is_polygon(&self) -> bool {
        matches!(self, BoundaryOverlay::Polygon { .. })
    }
}

/// Fetches city outlines once per `(city, state)` and falls back to a fixed-radius circle.
pub struct BoundaryProvider {
    cache: Arc<BoundaryCache>,
    geocoder: Arc<dyn Geocoder>,
    locks: KeyedLocks,
    config: LocatorConfig,
}

impl BoundaryProvider {
    pub fn new(cache: Arc<BoundaryCache>, geocoder: Arc<dyn Geocoder>, config: LocatorConfig) -> Self {
        Self {
            cache,
            geocoder,
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn cache(&self) -> &BoundaryCache {
        &self.cache
    }

    pub async fn fetch_boundary(&self, city: &str, state: &str) -> Option<Ring> {
        let key = boundary_key(city, state);
        if let Some(entry) = self.cache.get(&key) {
            return into_ring(entry);
        }

        let _guard = self.locks.acquire(&key).await;
        if let Some(entry) = self.cache.get(&key) {
            return into_ring(entry);
        }

        let query = GeocodeQuery::outline(format!(
            "{}, {}, {}",
            city.trim(),
            state.trim(),
            self.config.country
        ));
        let ring = search_or_none(self.geocoder.as_ref(), &query, self.config.request_timeout)
            .await
            .and_then(|hit| hit.geometry)
            .and_then(|geometry| reduce_geometry(&geometry));

        let entry = match ring {
            Some(ring) => {
                debug!(%key, points = ring.len(), "fetched boundary");
                BoundaryEntry::Ring(ring)
            }
            None => {
                debug!(%key, "no boundary available");
                BoundaryEntry::Missing
            }
        };
        self.cache.insert(key, entry.clone());
        into_ring(entry)
    }

    /// Polygon when an outline exists for the record's city, otherwise a circle at `coordinate`.
    pub async fn resolve_overlay(
        &self,
        record: &CheckpointRecord,
        coordinate: Coordinate,
    ) -> BoundaryOverlay {
        let circle = BoundaryOverlay::Circle {
            center: coordinate,
            radius_meters: self.config.fallback_radius_meters,
        };
        let Some(city) = record.city_name().filter(|city| !is_unknown_city(city)) else {
            return circle;
        };
        let state = record.state_or(&self.config.default_state);

        match self.fetch_boundary(city, state).await {
            Some(ring) => match Bounds::from_points(&ring) {
                Some(bounds) => BoundaryOverlay::Polygon { ring, bounds },
                None => circle,
            },
            None => circle,
        }
    }
}

fn into_ring(entry: BoundaryEntry) -> Option<Ring> {
    match entry {
        BoundaryEntry::Ring(ring) => Some(ring),
        BoundaryEntry::Missing => None,
    }
}

/// Placeholder city names the record source uses when the city is not known.
fn is_unknown_city(city: &str) -> bool {
    let city = city.trim();
    city.eq_ignore_ascii_case("unknown") || city.eq_ignore_ascii_case("unknown city")
}

/// Outer ring of a GeoJSON `Polygon`, or of the first polygon of a `MultiPolygon`.
/// Any other geometry, or fewer than three valid positions, yields `None`.
pub fn reduce_geometry(geometry: &Value) -> Option<Ring> {
    let coordinates = geometry.get("coordinates")?;
    let outer = match geometry.get("type")?.as_str()? {
        "Polygon" => coordinates.get(0)?,
        "MultiPolygon" => coordinates.get(0)?.get(0)?,
        _ => return None,
    };
    let ring = outer
        .as_array()?
        .iter()
        .map(|position| {
            let position = position
                .as_array()?
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<f64>>>()?;
            Coordinate::from_position(&position)
        })
        .collect::<Option<Ring>>()?;
    (ring.len() >= 3).then_some(ring)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use checkpoint_shared::{CheckpointRecord, Coordinate};
    use serde_json::json;

    use super::{BoundaryOverlay, BoundaryProvider, reduce_geometry};
    use crate::cache::{BoundaryCache, BoundaryEntry};
    use crate::config::LocatorConfig;
    use crate::geocoder::GeocodeHit;
    use crate::testing::{Scripted, ScriptedGeocoder};

    fn provider(geocoder: Arc<ScriptedGeocoder>) -> BoundaryProvider {
        BoundaryProvider::new(Arc::new(BoundaryCache::new()), geocoder, LocatorConfig::default())
    }

    fn record(city: Option<&str>) -> CheckpointRecord {
        CheckpointRecord {
            id: "7".to_string(),
            state: "CA".to_string(),
            city: city.map(str::to_string),
            county: Some("Fresno County".to_string()),
            ..Default::default()
        }
    }

    fn square() -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[-119.9, 36.6], [-119.6, 36.6], [-119.6, 36.9], [-119.9, 36.9], [-119.9, 36.6]]]
        })
    }

    #[tokio::test]
    async fn missing_geometry_falls_back_to_circle_once() {
        let geocoder = Arc::new(ScriptedGeocoder::new().hit("Fresno, CA, USA", 36.7, -119.8));
        let provider = provider(Arc::clone(&geocoder));
        let at = Coordinate::new(36.7378, -119.7871);

        let overlay = provider.resolve_overlay(&record(Some("Fresno")), at).await;
        assert_eq!(
            overlay,
            BoundaryOverlay::Circle {
                center: at,
                radius_meters: 5000.0
            }
        );

        let again = provider.resolve_overlay(&record(Some("fresno")), at).await;
        assert_eq!(again, overlay);
        assert_eq!(geocoder.call_count(), 1);
        assert_eq!(provider.cache().get("fresno-ca"), Some(BoundaryEntry::Missing));
    }

    #[tokio::test]
    async fn polygon_hit_frames_its_bounds() {
        let geocoder = Arc::new(ScriptedGeocoder::new().respond(
            "Fresno, CA, USA",
            Scripted::Hit(GeocodeHit {
                coordinate: Coordinate::new(36.7, -119.8),
                geometry: Some(square()),
            }),
        ));
        let provider = provider(Arc::clone(&geocoder));

        let overlay = provider
            .resolve_overlay(&record(Some("Fresno")), Coordinate::new(0.0, 0.0))
            .await;
        let BoundaryOverlay::Polygon { ring, bounds } = overlay else {
            panic!("expected a polygon overlay");
        };
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], Coordinate::new(36.6, -119.9));
        assert_eq!((bounds.south, bounds.west, bounds.north, bounds.east), (36.6, -119.9, 36.9, -119.6));
    }

    #[tokio::test]
    async fn placeholder_and_absent_cities_skip_the_fetch() {
        let geocoder = Arc::new(ScriptedGeocoder::new());
        let provider = provider(Arc::clone(&geocoder));
        let at = Coordinate::new(1.0, 2.0);

        for city in [None, Some("Unknown City"), Some(" unknown "), Some("  ")] {
            let overlay = provider.resolve_overlay(&record(city), at).await;
            assert!(!overlay.is_polygon());
        }
        assert_eq!(geocoder.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_is_cached_as_missing() {
        let geocoder = Arc::new(ScriptedGeocoder::new().respond("Fresno, CA, USA", Scripted::Fail));
        let provider = provider(Arc::clone(&geocoder));

        assert_eq!(provider.fetch_boundary("Fresno", "CA").await, None);
        assert_eq!(provider.fetch_boundary(" FRESNO", "ca ").await, None);
        assert_eq!(geocoder.call_count(), 1);
    }

    #[test]
    fn multipolygon_reduces_to_first_outer_ring() {
        let geometry = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[1.0, 2.0], [3.0, 2.0], [3.0, 4.0], [1.0, 2.0]], [[9.0, 9.0], [9.5, 9.0], [9.5, 9.5]]],
                [[[50.0, 50.0], [51.0, 50.0], [51.0, 51.0]]]
            ]
        });
        let ring = reduce_geometry(&geometry).expect("first ring");
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[1], Coordinate::new(2.0, 3.0));
    }

    #[test]
    fn other_or_malformed_geometry_is_dropped() {
        assert_eq!(reduce_geometry(&json!({"type": "Point", "coordinates": [1.0, 2.0]})), None);
        assert_eq!(reduce_geometry(&json!({"type": "Polygon"})), None);
        assert_eq!(reduce_geometry(&json!({"type": "Polygon", "coordinates": []})), None);
        assert_eq!(
            reduce_geometry(&json!({"type": "Polygon", "coordinates": [[[1.0, "x"], [2.0, 2.0], [3.0, 3.0]]]})),
            None
        );
        assert_eq!(
            reduce_geometry(&json!({"type": "Polygon", "coordinates": [[[1.0, 1.0], [2.0, 2.0]]]})),
            None
        );
        assert!(reduce_geometry(&square()).is_some());
    }
}
