use std::collections::BTreeMap;

use checkpoint_shared::Coordinate;
use serde::Serialize;

use super::{
    MapHandle, MarkerHandle, MarkerIcon, MarkerLabel, OverlayHandle, OverlayStyle, Viewport,
};
use crate::boundary::BoundaryOverlay;

/// Running totals of calls made against the map, for tests and health output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapOps {
    pub markers_added: u64,
    pub markers_moved: u64,
    pub icons_set: u64,
    pub labels_set: u64,
    pub markers_removed: u64,
    pub overlays_added: u64,
    pub overlays_removed: u64,
    pub viewport_changes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerView {
    pub handle: MarkerHandle,
    pub record_id: String,
    pub position: Coordinate,
    pub icon: MarkerIcon,
    pub label: MarkerLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayView {
    pub handle: OverlayHandle,
    pub overlay: BoundaryOverlay,
    pub style: OverlayStyle,
}

/// Everything currently drawn, in a serializable form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSnapshot {
    pub markers: Vec<MarkerView>,
    pub overlays: Vec<OverlayView>,
    pub user_location: Option<Coordinate>,
    pub viewport: Option<Viewport>,
}

/// In-memory map control. Backs the server and the engine tests.
#[derive(Debug, Default)]
pub struct HeadlessMap {
    next_handle: u64,
    markers: BTreeMap<u64, MarkerView>,
    overlays: BTreeMap<u64, OverlayView>,
    user_marker: Option<(MarkerHandle, Coordinate)>,
    viewport: Option<Viewport>,
    ops: MapOps,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&MarkerView> {
        self.markers.get(&handle.0)
    }

    pub fn marker_for(&self, record_id: &str) -> Option<&MarkerView> {
        self.markers.values().find(|view| view.record_id == record_id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn overlays(&self) -> impl Iterator<Item = &BoundaryOverlay> {
        self.overlays.values().map(|view| &view.overlay)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.user_marker.map(|(_, position)| position)
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn ops(&self) -> MapOps {
        self.ops
    }

    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            markers: self.markers.values().cloned().collect(),
            overlays: self.overlays.values().cloned().collect(),
            user_location: self.user_location(),
            viewport: self.viewport,
        }
    }
}

impl MapHandle for HeadlessMap {
    fn add_marker(
        &mut self,
        record_id: &str,
        position: Coordinate,
        icon: &MarkerIcon,
        label: &MarkerLabel,
    ) -> MarkerHandle {
        let handle = MarkerHandle(self.mint());
        self.markers.insert(
            handle.0,
            MarkerView {
                handle,
                record_id: record_id.to_string(),
                position,
                icon: icon.clone(),
                label: label.clone(),
            },
        );
        self.ops.markers_added += 1;
        handle
    }

    fn move_marker(&mut self, marker: MarkerHandle, position: Coordinate) {
        if let Some(view) = self.markers.get_mut(&marker.0) {
            view.position = position;
            self.ops.markers_moved += 1;
        }
    }

    fn set_marker_icon(&mut self, marker: MarkerHandle, icon: &MarkerIcon) {
        if let Some(view) = self.markers.get_mut(&marker.0) {
            view.icon = icon.clone();
            self.ops.icons_set += 1;
        }
    }

    fn set_marker_label(&mut self, marker: MarkerHandle, label: &MarkerLabel) {
        if let Some(view) = self.markers.get_mut(&marker.0) {
            view.label = label.clone();
            self.ops.labels_set += 1;
        }
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        if self.markers.remove(&marker.0).is_some() {
            self.ops.markers_removed += 1;
        }
    }

    fn add_overlay(&mut self, overlay: &BoundaryOverlay, style: &OverlayStyle) -> OverlayHandle {
        let handle = OverlayHandle(self.mint());
        self.overlays.insert(
            handle.0,
            OverlayView {
                handle,
                overlay: overlay.clone(),
                style: style.clone(),
            },
        );
        self.ops.overlays_added += 1;
        handle
    }

    fn remove_overlay(&mut self, overlay: OverlayHandle) {
        if self.overlays.remove(&overlay.0).is_some() {
            self.ops.overlays_removed += 1;
        }
    }

    fn add_user_marker(&mut self, position: Coordinate) -> MarkerHandle {
        let handle = MarkerHandle(self.mint());
        self.user_marker = Some((handle, position));
        handle
    }

    fn remove_user_marker(&mut self, marker: MarkerHandle) {
        if self.user_marker.is_some_and(|(current, _)| current == marker) {
            self.user_marker = None;
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.ops.viewport_changes += 1;
    }
}
