use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use checkpoint_shared::dates::is_today;
use checkpoint_shared::{CheckpointRecord, Clock, Coordinate, RecordFilter};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::{
    MapHandle, MarkerHandle, MarkerIcon, MarkerLabel, OverlayHandle, OverlayStyle, Viewport,
};
use crate::batch::ResolvedCoordinate;
use crate::boundary::{BoundaryOverlay, BoundaryProvider};
use crate::colors::LocationColors;
use crate::config::USER_LOCATION_ZOOM;
use crate::resolver::CoordinateResolver;

const UNKNOWN_CITY_TITLE: &str = "Unknown City";
const UNDATED_LABEL: &str = "Date TBD";

type RecordCallback = Box<dyn FnMut(&str) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPhase {
    /// Placed at the default center; an authoritative coordinate may still arrive.
    Default,
    Resolved,
}

/// What one reconcile pass changed on the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Work the caller must run to show the selected record's boundary.
/// Hand the result back through [`MapSyncEngine::attach_overlay`] with the same generation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRequest {
    pub generation: u64,
    pub record: CheckpointRecord,
    pub coordinate: Coordinate,
}

#[derive(Debug)]
struct MarkerState {
    handle: MarkerHandle,
    position: Coordinate,
    icon: MarkerIcon,
    label: MarkerLabel,
    location: String,
    phase: MarkerPhase,
    record: CheckpointRecord,
}

/// Owns the live map and keeps its markers, selection overlay and user-location
/// marker consistent with the latest filtered record set.
pub struct MapSyncEngine<M: MapHandle> {
    map: M,
    resolver: Arc<CoordinateResolver>,
    colors: Arc<LocationColors>,
    clock: Arc<dyn Clock>,
    markers: HashMap<String, MarkerState>,
    selected: Option<String>,
    generation: u64,
    overlay: Option<OverlayHandle>,
    user_marker: Option<MarkerHandle>,
    on_marker_selected: Option<RecordCallback>,
    on_view_details: Option<RecordCallback>,
}

impl<M: MapHandle> MapSyncEngine<M> {
    pub fn new(
        map: M,
        resolver: Arc<CoordinateResolver>,
        colors: Arc<LocationColors>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            map,
            resolver,
            colors,
            clock,
            markers: HashMap::new(),
            selected: None,
            generation: 0,
            overlay: None,
            user_marker: None,
            on_marker_selected: None,
            on_view_details: None,
        }
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn on_marker_selected(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_marker_selected = Some(Box::new(callback));
    }

    pub fn on_view_details_requested(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_view_details = Some(Box::new(callback));
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn marker_phase(&self, id: &str) -> Option<MarkerPhase> {
        self.markers.get(id).map(|state| state.phase)
    }

    pub fn marker_position(&self, id: &str) -> Option<Coordinate> {
        self.markers.get(id).map(|state| state.position)
    }

    /// Records currently on the map, in no particular order.
    pub fn rendered_records(&self) -> Vec<CheckpointRecord> {
        self.markers
            .values()
            .map(|state| state.record.clone())
            .collect()
    }

    /// Diff the filtered set against rendered markers. Running it twice with the
    /// same input changes nothing the second time.
    pub fn set_records(
        &mut self,
        records: &[CheckpointRecord],
        filter: &RecordFilter,
    ) -> ReconcileReport {
        let today = self.clock.today();
        let visible = filter.apply(records, today);
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::with_capacity(visible.len());

        for record in visible {
            if !seen.insert(record.id.as_str()) {
                continue;
            }
            let icon = self.icon_for(record, today);
            let location = self.resolver.location_key(record);

            if let Some(state) = self.markers.get_mut(&record.id) {
                let mut changed = false;
                if state.location != location {
                    let (position, phase) = initial_position(&self.resolver, record);
                    if position != state.position {
                        self.map.move_marker(state.handle, position);
                    }
                    state.position = position;
                    state.phase = phase;
                    state.location = location;
                    changed = true;
                }
                if state.icon != icon {
                    self.map.set_marker_icon(state.handle, &icon);
                    state.icon = icon;
                    changed = true;
                }
                let label = label_for(record);
                if state.label != label {
                    self.map.set_marker_label(state.handle, &label);
                    state.label = label;
                    changed = true;
                }
                if state.record != *record {
                    state.record = record.clone();
                }
                if changed {
                    report.updated += 1;
                }
            } else {
                let (position, phase) = initial_position(&self.resolver, record);
                let label = label_for(record);
                let handle = self.map.add_marker(&record.id, position, &icon, &label);
                self.markers.insert(
                    record.id.clone(),
                    MarkerState {
                        handle,
                        position,
                        icon,
                        label,
                        location,
                        phase,
                        record: record.clone(),
                    },
                );
                report.created += 1;
            }
        }

        let stale: Vec<String> = self
            .markers
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(state) = self.markers.remove(&id) {
                self.map.remove_marker(state.handle);
                report.removed += 1;
            }
        }

        let selection_gone = self
            .selected
            .as_ref()
            .is_some_and(|id| !self.markers.contains_key(id));
        if selection_gone {
            debug!(id = ?self.selected, "selected record left the set; clearing selection");
            self.clear_selection();
        }

        if !report.is_noop() {
            debug!(
                created = report.created,
                updated = report.updated,
                removed = report.removed,
                markers = self.markers.len(),
                "reconciled markers"
            );
        }
        report
    }

    /// Move a marker to its authoritative coordinate. Returns whether the marker moved.
    pub fn apply_resolved(&mut self, resolved: &ResolvedCoordinate) -> bool {
        let default_center = self.resolver.default_center();
        let threshold = self.resolver.config().reposition_threshold_degrees;
        let Some(state) = self.markers.get_mut(&resolved.id) else {
            return false;
        };
        if state.location != resolved.location {
            return false;
        }

        let target = resolved.coordinate;
        if target != default_center {
            state.phase = MarkerPhase::Resolved;
        }
        let should_move = state.position == default_center
            || target.differs_from(&state.position, threshold);
        if !should_move || target == state.position {
            return false;
        }
        self.map.move_marker(state.handle, target);
        state.position = target;
        true
    }

    /// Change the selection. The old overlay goes first; the returned request
    /// describes the boundary to load for the new one.
    pub fn select(&mut self, id: Option<&str>) -> Option<BoundaryRequest> {
        if self.selected.as_deref() == id {
            return None;
        }

        let today = self.clock.today();
        self.clear_selection();

        let id = id?;
        if !self.markers.contains_key(id) {
            debug!(%id, "ignoring selection of a record that is not rendered");
            return None;
        }
        self.selected = Some(id.to_string());
        self.refresh_icon(id, today);

        let state = self.markers.get(id)?;
        Some(BoundaryRequest {
            generation: self.generation,
            record: state.record.clone(),
            coordinate: state.position,
        })
    }

    /// Draw a loaded overlay unless the selection it was loaded for has been superseded.
    pub fn attach_overlay(&mut self, generation: u64, overlay: &BoundaryOverlay) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale overlay");
            return false;
        }
        let Some(state) = self.selected.as_deref().and_then(|id| self.markers.get(id)) else {
            return false;
        };
        let color = self
            .colors
            .checkpoint_color(state.record.county_name(), state.record.city_name());

        if let Some(previous) = self.overlay.take() {
            self.map.remove_overlay(previous);
        }
        self.overlay = Some(self.map.add_overlay(overlay, &OverlayStyle::for_color(color)));
        self.map.set_viewport(Viewport::framing(overlay));
        true
    }

    /// Select and load the boundary inline. Callers that must stay responsive use
    /// [`select`](Self::select) and run the request elsewhere.
    pub async fn select_and_load(&mut self, id: Option<&str>, boundaries: &BoundaryProvider) {
        if let Some(request) = self.select(id) {
            let overlay = boundaries
                .resolve_overlay(&request.record, request.coordinate)
                .await;
            self.attach_overlay(request.generation, &overlay);
        }
    }

    /// A marker was clicked on the map.
    pub fn marker_clicked(&mut self, id: &str) -> Option<BoundaryRequest> {
        if !self.markers.contains_key(id) || self.is_selected(id) {
            return None;
        }
        if let Some(callback) = self.on_marker_selected.as_mut() {
            callback(id);
        }
        self.select(Some(id))
    }

    /// The "View Details" action in a marker popup.
    pub fn view_details_clicked(&mut self, id: &str) -> bool {
        if !self.markers.contains_key(id) {
            return false;
        }
        if let Some(callback) = self.on_view_details.as_mut() {
            callback(id);
        }
        true
    }

    /// Replace the user-location marker and re-center on it.
    pub fn set_user_location(&mut self, position: Coordinate) {
        if let Some(previous) = self.user_marker.take() {
            self.map.remove_user_marker(previous);
        }
        self.user_marker = Some(self.map.add_user_marker(position));
        self.map.set_viewport(Viewport::Center {
            center: position,
            zoom: USER_LOCATION_ZOOM,
        });
    }

    fn clear_selection(&mut self) {
        self.generation += 1;
        if let Some(overlay) = self.overlay.take() {
            self.map.remove_overlay(overlay);
        }
        if let Some(previous) = self.selected.take() {
            let today = self.clock.today();
            self.refresh_icon(&previous, today);
        }
    }

    fn refresh_icon(&mut self, id: &str, today: NaiveDate) {
        let Some(record) = self.markers.get(id).map(|state| state.record.clone()) else {
            return;
        };
        let icon = self.icon_for(&record, today);
        if let Some(state) = self.markers.get_mut(id) {
            if state.icon != icon {
                self.map.set_marker_icon(state.handle, &icon);
                state.icon = icon;
            }
        }
    }

    fn icon_for(&self, record: &CheckpointRecord, today: NaiveDate) -> MarkerIcon {
        MarkerIcon {
            color: self
                .colors
                .checkpoint_color(record.county_name(), record.city_name()),
            selected: self.is_selected(&record.id),
            today: is_today(record.date.as_deref(), today),
        }
    }
}

fn initial_position(resolver: &CoordinateResolver, record: &CheckpointRecord) -> (Coordinate, MarkerPhase) {
    match resolver.lookup_known(record) {
        Some(position) => (position, MarkerPhase::Resolved),
        None => (resolver.lookup_sync(record), MarkerPhase::Default),
    }
}

fn label_for(record: &CheckpointRecord) -> MarkerLabel {
    MarkerLabel {
        title: record.city_name().unwrap_or(UNKNOWN_CITY_TITLE).to_string(),
        county: record.county_name().unwrap_or_default().to_string(),
        date: record
            .local_date()
            .map(|day| day.format("%-m/%-d/%Y").to_string())
            .unwrap_or_else(|| UNDATED_LABEL.to_string()),
    }
}
