pub mod batch;
pub mod boundary;
pub mod cache;
pub mod colors;
pub mod config;
pub mod gazetteer;
pub mod geocoder;
pub mod map;
pub mod nominatim;
pub mod resolver;
pub mod source;

#[cfg(test)]
mod testing;

pub use batch::{BatchGeocoder, ResolvedCoordinate};
pub use boundary::{BoundaryOverlay, BoundaryProvider};
pub use cache::{BoundaryCache, ResolutionCache};
pub use colors::LocationColors;
pub use config::LocatorConfig;
pub use gazetteer::{Gazetteer, GazetteerError};
pub use geocoder::{GeocodeError, GeocodeHit, GeocodeQuery, Geocoder};
pub use map::{HeadlessMap, MapHandle, MapSyncEngine};
pub use nominatim::NominatimClient;
pub use resolver::CoordinateResolver;
pub use source::{RecordQuery, RecordSource, SourceError};
