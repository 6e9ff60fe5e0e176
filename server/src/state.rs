use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use checkpoint_client::{
    BatchGeocoder, BoundaryCache, BoundaryProvider, CoordinateResolver, Gazetteer, Geocoder,
    HeadlessMap, LocationColors, LocatorConfig, MapSyncEngine, RecordQuery, RecordSource,
    ResolutionCache,
};
use checkpoint_shared::Clock;
use tokio::sync::{RwLock, mpsc};
use tracing::info;

use crate::services::map_actor::{MapActor, MapCommand};

/// Map view serialized once per change and shared by every `GET /api/map`.
#[derive(Debug, Clone)]
pub struct MapSnapshotJson {
    pub revision: u64,
    pub json: Arc<Bytes>,
}

impl Default for MapSnapshotJson {
    fn default() -> Self {
        Self {
            revision: 0,
            json: Arc::new(Bytes::from_static(
                br#"{"revision":0,"generation":0,"selected":null,"marker_count":0,"filter":{"mode":"all","search":null},"markers":[],"overlay":null,"user_location":null,"viewport":null}"#,
            )),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub record_source: RecordSource,
    pub record_query: RecordQuery,
    pub colors: Arc<LocationColors>,
    pub resolver: Arc<CoordinateResolver>,
    /// Single-writer queue into the map actor.
    pub commands: mpsc::Sender<MapCommand>,
    pub map_snapshot: Arc<RwLock<MapSnapshotJson>>,
    pub observability: Arc<ObservabilityCounters>,
}

/// Collaborators the state is assembled from. `main` builds the real ones; tests inject doubles.
pub struct Services {
    pub record_source: RecordSource,
    pub geocoder: Arc<dyn Geocoder>,
    pub gazetteer: Gazetteer,
    pub clock: Arc<dyn Clock>,
    pub locator: LocatorConfig,
    pub command_buffer: usize,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    record_polls_total: AtomicU64,
    record_poll_failures_total: AtomicU64,
    map_requests_total: AtomicU64,
    markers_repositioned_total: AtomicU64,
    overlays_attached_total: AtomicU64,
    stale_overlays_discarded_total: AtomicU64,
    marker_selections_total: AtomicU64,
    view_details_requests_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ObservabilitySnapshot {
    pub record_polls_total: u64,
    pub record_poll_failures_total: u64,
    pub map_requests_total: u64,
    pub markers_repositioned_total: u64,
    pub overlays_attached_total: u64,
    pub stale_overlays_discarded_total: u64,
    pub marker_selections_total: u64,
    pub view_details_requests_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            record_polls_total: self.record_polls_total.load(Ordering::Relaxed),
            record_poll_failures_total: self.record_poll_failures_total.load(Ordering::Relaxed),
            map_requests_total: self.map_requests_total.load(Ordering::Relaxed),
            markers_repositioned_total: self.markers_repositioned_total.load(Ordering::Relaxed),
            overlays_attached_total: self.overlays_attached_total.load(Ordering::Relaxed),
            stale_overlays_discarded_total: self
                .stale_overlays_discarded_total
                .load(Ordering::Relaxed),
            marker_selections_total: self.marker_selections_total.load(Ordering::Relaxed),
            view_details_requests_total: self.view_details_requests_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_poll(&self) {
        self.record_polls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_failure(&self) {
        self.record_poll_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_map_request(&self) {
        self.map_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_marker_repositioned(&self) {
        self.markers_repositioned_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overlay_attached(&self) {
        self.overlays_attached_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_overlay(&self) {
        self.stale_overlays_discarded_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_marker_selection(&self) {
        self.marker_selections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_details(&self) {
        self.view_details_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    /// Wire the shared caches, resolver and map engine. The returned actor must be
    /// spawned; it is the only owner of the map.
    pub fn build(services: Services) -> (Self, MapActor) {
        let Services {
            record_source,
            geocoder,
            gazetteer,
            clock,
            locator,
            command_buffer,
        } = services;

        info!(
            gazetteer_entries = gazetteer.len(),
            batch_size = locator.batch_size,
            batch_delay_ms = locator.batch_delay.as_millis() as u64,
            "building location services"
        );

        let record_query = RecordQuery {
            state: Some(locator.default_state.clone()),
            ..RecordQuery::default()
        };
        let colors = Arc::new(LocationColors::new());
        let resolver = Arc::new(CoordinateResolver::new(
            gazetteer,
            Arc::new(ResolutionCache::new()),
            Arc::clone(&geocoder),
            locator.clone(),
        ));
        let boundaries = Arc::new(BoundaryProvider::new(
            Arc::new(BoundaryCache::new()),
            geocoder,
            locator,
        ));
        let batch = Arc::new(BatchGeocoder::new(Arc::clone(&resolver)));
        let engine = MapSyncEngine::new(
            HeadlessMap::new(),
            Arc::clone(&resolver),
            Arc::clone(&colors),
            clock,
        );

        let (commands, receiver) = mpsc::channel(command_buffer.max(1));
        let map_snapshot = Arc::new(RwLock::new(MapSnapshotJson::default()));
        let observability = Arc::new(ObservabilityCounters::default());
        let actor = MapActor::new(
            engine,
            batch,
            boundaries,
            receiver,
            Arc::clone(&map_snapshot),
            Arc::clone(&observability),
        );

        let state = Self {
            record_source,
            record_query,
            colors,
            resolver,
            commands,
            map_snapshot,
            observability,
        };
        (state, actor)
    }
}

/// Shared upstream client: identifying user agent plus request and connect timeouts.
pub fn build_http_client(
    user_agent: &str,
    request_timeout: std::time::Duration,
    connect_timeout: std::time::Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
}
