use std::sync::Arc;

use checkpoint_shared::colors::normalize_name;
use checkpoint_shared::{CheckpointRecord, Coordinate};
use tracing::{debug, info};

use crate::cache::{KeyedLocks, Resolution, ResolutionCache, city_key, county_key};
use crate::config::LocatorConfig;
use crate::gazetteer::Gazetteer;
use crate::geocoder::{GeocodeQuery, Geocoder, search_or_none};

/// Turns a record's city/county/state into a coordinate: curated table first,
/// then the resolution cache, then the external geocoder.
pub struct CoordinateResolver {
    gazetteer: Gazetteer,
    cache: Arc<ResolutionCache>,
    geocoder: Arc<dyn Geocoder>,
    locks: KeyedLocks,
    config: LocatorConfig,
}

impl CoordinateResolver {
    pub fn new(
        gazetteer: Gazetteer,
        cache: Arc<ResolutionCache>,
        geocoder: Arc<dyn Geocoder>,
        config: LocatorConfig,
    ) -> Self {
        Self {
            gazetteer,
            cache,
            geocoder,
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn default_center(&self) -> Coordinate {
        self.config.default_center
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Best-effort position for first paint. Never waits and never fails.
    pub fn lookup_sync(&self, record: &CheckpointRecord) -> Coordinate {
        self.lookup_known(record)
            .unwrap_or(self.config.default_center)
    }

    /// Static entry or previously resolved cache entry, if any.
    pub fn lookup_known(&self, record: &CheckpointRecord) -> Option<Coordinate> {
        if let Some(coordinate) = self.gazetteer.lookup(record) {
            return Some(coordinate);
        }
        let state = record.state_or(&self.config.default_state);
        let cached = |key: Option<String>| {
            key.and_then(|key| self.cache.get(&key))
                .and_then(Resolution::coordinate)
        };
        cached(record.city_name().map(|city| city_key(city, state)))
            .or_else(|| cached(record.county_name().map(|county| county_key(county, state))))
    }

    /// Normalized city/county/state triple. Two records with the same value resolve identically.
    pub fn location_key(&self, record: &CheckpointRecord) -> String {
        format!(
            "{}|{}|{}",
            normalize_name(record.city_name().unwrap_or_default()),
            normalize_name(record.county_name().unwrap_or_default()),
            normalize_name(record.state_or(&self.config.default_state)),
        )
    }

    /// The key the batch geocoder tracks for this record: city first, else county.
    pub fn cache_key(&self, record: &CheckpointRecord) -> Option<String> {
        let state = record.state_or(&self.config.default_state);
        record
            .city_name()
            .map(|city| city_key(city, state))
            .or_else(|| record.county_name().map(|county| county_key(county, state)))
    }

    /// True when the record is not covered by the curated table and its key was never attempted.
    pub fn needs_resolution(&self, record: &CheckpointRecord) -> bool {
        if self.gazetteer.lookup(record).is_some() {
            return false;
        }
        self.cache_key(record)
            .is_some_and(|key| !self.cache.contains(&key))
    }

    /// Authoritative resolution. Always yields a coordinate; unresolvable records
    /// get the default center and a cached sentinel so they are not retried.
    pub async fn resolve(&self, record: &CheckpointRecord) -> Coordinate {
        if let Some(coordinate) = self.gazetteer.lookup(record) {
            return coordinate;
        }

        let state = record.state_or(&self.config.default_state).to_string();
        let country = &self.config.country;
        let city = record
            .city_name()
            .map(|city| (city_key(city, &state), format!("{city}, {state}, {country}")));
        let county = record.county_name().map(|county| {
            (
                county_key(county, &state),
                format!("{} County, {state}, {country}", strip_county_suffix(county)),
            )
        });

        for (key, _) in city.iter().chain(county.iter()) {
            if let Some(Resolution::Resolved(coordinate)) = self.cache.get(key) {
                return coordinate;
            }
        }

        for (key, query) in city.into_iter().chain(county) {
            if let Some(coordinate) = self.resolve_key(key, query).await {
                return coordinate;
            }
        }

        self.config.default_center
    }

    async fn resolve_key(&self, key: String, query: String) -> Option<Coordinate> {
        let _guard = self.locks.acquire(&key).await;
        if let Some(resolution) = self.cache.get(&key) {
            return resolution.coordinate();
        }

        let hit = search_or_none(
            self.geocoder.as_ref(),
            &GeocodeQuery::point(query.as_str()),
            self.config.request_timeout,
        )
        .await;

        let resolution = match hit {
            Some(hit) => {
                debug!(%key, latitude = hit.coordinate.latitude, longitude = hit.coordinate.longitude, "geocoded location");
                Resolution::Resolved(hit.coordinate)
            }
            None => {
                info!(%key, %query, "no geocoding result; caching as unresolved");
                Resolution::Unresolved
            }
        };
        self.cache.insert(key, resolution);
        resolution.coordinate()
    }
}

/// "Placer County" → "Placer", so the query suffix is not doubled.
fn strip_county_suffix(county: &str) -> &str {
    let trimmed = county.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.strip_suffix(" county") {
        Some(rest) if !rest.trim().is_empty() => trimmed[..rest.len()].trim_end(),
        _ => trimmed,
    }
}
