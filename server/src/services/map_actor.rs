use std::sync::Arc;

use bytes::Bytes;
use checkpoint_client::map::{
    BoundaryRequest, MarkerLabel, MarkerPhase, OverlayView, ReconcileReport, Viewport,
};
use checkpoint_client::{
    BatchGeocoder, BoundaryOverlay, BoundaryProvider, HeadlessMap, MapSyncEngine,
    ResolvedCoordinate,
};
use checkpoint_shared::{CheckpointRecord, Coordinate, RecordFilter};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::state::{MapSnapshotJson, ObservabilityCounters};

/// Capacity of the internal queues that carry background results back to the actor.
const RESULT_BUFFER: usize = 64;

pub enum MapCommand {
    ReplaceRecords {
        records: Vec<CheckpointRecord>,
    },
    SetFilter {
        filter: RecordFilter,
        reply: oneshot::Sender<ReconcileReport>,
    },
    Select {
        id: Option<String>,
        reply: oneshot::Sender<SelectOutcome>,
    },
    ViewDetails {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    SetUserLocation {
        position: Coordinate,
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOutcome {
    pub selected: Option<String>,
    pub generation: u64,
}

struct LoadedOverlay {
    generation: u64,
    overlay: BoundaryOverlay,
}

#[derive(Serialize)]
struct MarkerEntry<'a> {
    id: &'a str,
    position: Coordinate,
    color: &'static str,
    selected: bool,
    today: bool,
    size_px: u32,
    phase: Option<MarkerPhase>,
    label: &'a MarkerLabel,
}

#[derive(Serialize)]
struct MapView<'a> {
    revision: u64,
    generation: u64,
    selected: Option<&'a str>,
    marker_count: usize,
    filter: &'a RecordFilter,
    markers: Vec<MarkerEntry<'a>>,
    overlay: Option<&'a OverlayView>,
    user_location: Option<Coordinate>,
    viewport: Option<Viewport>,
}

/// Sole owner of the map engine. Every mutation arrives through one queue, so
/// markers, selection and overlays are never touched concurrently.
pub struct MapActor {
    engine: MapSyncEngine<HeadlessMap>,
    records: Vec<CheckpointRecord>,
    filter: RecordFilter,
    batch: Arc<BatchGeocoder>,
    boundaries: Arc<BoundaryProvider>,
    commands: mpsc::Receiver<MapCommand>,
    resolved_tx: mpsc::Sender<ResolvedCoordinate>,
    resolved_rx: mpsc::Receiver<ResolvedCoordinate>,
    overlay_tx: mpsc::Sender<LoadedOverlay>,
    overlay_rx: mpsc::Receiver<LoadedOverlay>,
    /// At most one geocoding pass runs at a time so batches stay rate limited.
    geocoding: Option<JoinHandle<usize>>,
    /// The rendered set changed while a pass was running.
    geocoding_stale: bool,
    snapshot: Arc<RwLock<MapSnapshotJson>>,
    observability: Arc<ObservabilityCounters>,
    revision: u64,
}

impl MapActor {
    pub fn new(
        mut engine: MapSyncEngine<HeadlessMap>,
        batch: Arc<BatchGeocoder>,
        boundaries: Arc<BoundaryProvider>,
        commands: mpsc::Receiver<MapCommand>,
        snapshot: Arc<RwLock<MapSnapshotJson>>,
        observability: Arc<ObservabilityCounters>,
    ) -> Self {
        {
            let observability = Arc::clone(&observability);
            engine.on_marker_selected(move |id| {
                observability.record_marker_selection();
                info!(%id, "checkpoint selected");
            });
        }
        {
            let observability = Arc::clone(&observability);
            engine.on_view_details_requested(move |id| {
                observability.record_view_details();
                info!(%id, "checkpoint details requested");
            });
        }

        let (resolved_tx, resolved_rx) = mpsc::channel(RESULT_BUFFER);
        let (overlay_tx, overlay_rx) = mpsc::channel(RESULT_BUFFER);
        Self {
            engine,
            records: Vec::new(),
            filter: RecordFilter::default(),
            batch,
            boundaries,
            commands,
            resolved_tx,
            resolved_rx,
            overlay_tx,
            overlay_rx,
            geocoding: None,
            geocoding_stale: false,
            snapshot,
            observability,
            revision: 0,
        }
    }

    async fn handle_command(&mut self, command: MapCommand) {
        match command {
            MapCommand::ReplaceRecords { records } => {
                self.records = records;
                self.reconcile();
                self.publish().await;
            }
            MapCommand::SetFilter { filter, reply } => {
                self.filter = filter;
                let report = self.reconcile();
                self.publish().await;
                let _ = reply.send(report);
            }
            MapCommand::Select { id, reply } => {
                let request = match id.as_deref() {
                    Some(id) => self.engine.marker_clicked(id),
                    None => self.engine.select(None),
                };
                if let Some(request) = request {
                    self.load_overlay(request);
                }
                self.publish().await;
                let _ = reply.send(SelectOutcome {
                    selected: self.engine.selected().map(str::to_string),
                    generation: self.engine.generation(),
                });
            }
            MapCommand::ViewDetails { id, reply } => {
                let _ = reply.send(self.engine.view_details_clicked(&id));
            }
            MapCommand::SetUserLocation { position, reply } => {
                self.engine.set_user_location(position);
                self.publish().await;
                let _ = reply.send(());
            }
        }
    }

    fn reconcile(&mut self) -> ReconcileReport {
        let report = self.engine.set_records(&self.records, &self.filter);
        self.schedule_geocoding();
        report
    }

    fn schedule_geocoding(&mut self) {
        if self.geocoding.is_some() {
            self.geocoding_stale = true;
            return;
        }
        let rendered = self.engine.rendered_records();
        let pending = self.batch.pending(&rendered).len();
        if pending == 0 {
            return;
        }
        debug!(pending, "scheduling background geocoding");
        self.geocoding = Some(Arc::clone(&self.batch).spawn(rendered, self.resolved_tx.clone()));
    }

    fn geocoding_finished(&mut self, outcome: Result<usize, JoinError>) {
        self.geocoding = None;
        match outcome {
            Ok(delivered) => debug!(delivered, "background geocoding pass finished"),
            Err(e) => warn!(error = %e, "background geocoding task failed"),
        }
        if std::mem::take(&mut self.geocoding_stale) {
            self.schedule_geocoding();
        }
    }

    fn load_overlay(&self, request: BoundaryRequest) {
        let boundaries = Arc::clone(&self.boundaries);
        let overlays = self.overlay_tx.clone();
        tokio::spawn(async move {
            let overlay = boundaries
                .resolve_overlay(&request.record, request.coordinate)
                .await;
            let loaded = LoadedOverlay {
                generation: request.generation,
                overlay,
            };
            if overlays.send(loaded).await.is_err() {
                debug!("map actor stopped before overlay arrived");
            }
        });
    }

    async fn apply_resolved(&mut self, resolved: ResolvedCoordinate) {
        if self.engine.apply_resolved(&resolved) {
            self.observability.record_marker_repositioned();
            self.publish().await;
        }
    }

    async fn attach_overlay(&mut self, loaded: LoadedOverlay) {
        if self.engine.attach_overlay(loaded.generation, &loaded.overlay) {
            self.observability.record_overlay_attached();
            self.publish().await;
        } else {
            self.observability.record_stale_overlay();
        }
    }

    /// Serialize the current view once and swap it in for readers.
    async fn publish(&mut self) {
        let revision = self.revision + 1;
        let map = self.engine.map().snapshot();
        let markers = map
            .markers
            .iter()
            .map(|marker| MarkerEntry {
                id: &marker.record_id,
                position: marker.position,
                color: marker.icon.color,
                selected: marker.icon.selected,
                today: marker.icon.today,
                size_px: marker.icon.size_px(),
                phase: self.engine.marker_phase(&marker.record_id),
                label: &marker.label,
            })
            .collect();
        let view = MapView {
            revision,
            generation: self.engine.generation(),
            selected: self.engine.selected(),
            marker_count: self.engine.marker_count(),
            filter: &self.filter,
            markers,
            overlay: map.overlays.first(),
            user_location: map.user_location,
            viewport: map.viewport,
        };

        match serde_json::to_vec(&view) {
            Ok(json) => {
                self.revision = revision;
                *self.snapshot.write().await = MapSnapshotJson {
                    revision,
                    json: Arc::new(Bytes::from(json)),
                };
            }
            Err(e) => warn!(error = %e, "failed to serialize map snapshot"),
        }
    }
}

pub async fn run(mut actor: MapActor) {
    info!("map actor started");
    loop {
        tokio::select! {
            command = actor.commands.recv() => match command {
                Some(command) => actor.handle_command(command).await,
                None => break,
            },
            Some(resolved) = actor.resolved_rx.recv() => actor.apply_resolved(resolved).await,
            Some(loaded) = actor.overlay_rx.recv() => actor.attach_overlay(loaded).await,
            outcome = wait_for(&mut actor.geocoding), if actor.geocoding.is_some() => {
                actor.geocoding_finished(outcome);
            }
        }
    }
    if let Some(geocoding) = actor.geocoding.take() {
        geocoding.abort();
    }
    info!("map actor stopped");
}

async fn wait_for(task: &mut Option<JoinHandle<usize>>) -> Result<usize, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
