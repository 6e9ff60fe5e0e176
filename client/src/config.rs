use std::time::Duration;

use checkpoint_shared::Coordinate;

/// Representative point for the service region (California).
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(36.7783, -119.4179);
pub const DEFAULT_STATE: &str = "CA";
pub const DEFAULT_COUNTRY: &str = "USA";
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const FALLBACK_RADIUS_METERS: f64 = 5000.0;
/// Roughly 1 km in either axis at California latitudes.
pub const REPOSITION_THRESHOLD_DEGREES: f64 = 0.01;

// Viewport framing
pub const BOUNDARY_PADDING_PX: u32 = 50;
pub const BOUNDARY_MAX_ZOOM: u8 = 13;
pub const CIRCLE_ZOOM: u8 = 12;
pub const USER_LOCATION_ZOOM: u8 = 10;

/// Knobs shared by the resolver, boundary provider, batch geocoder and map engine.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub default_center: Coordinate,
    pub default_state: String,
    pub country: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub request_timeout: Duration,
    pub fallback_radius_meters: f64,
    pub reposition_threshold_degrees: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            default_center: DEFAULT_CENTER,
            default_state: DEFAULT_STATE.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            fallback_radius_meters: FALLBACK_RADIUS_METERS,
            reposition_threshold_degrees: REPOSITION_THRESHOLD_DEGREES,
        }
    }
}
