//! Map control abstraction and the engine that keeps it in step with the record set.

mod headless;
mod sync;

use checkpoint_shared::colors::hex_to_rgba;
use checkpoint_shared::{Bounds, Coordinate};
use serde::Serialize;

use crate::boundary::BoundaryOverlay;
use crate::config::{BOUNDARY_MAX_ZOOM, BOUNDARY_PADDING_PX, CIRCLE_ZOOM};

pub use headless::{HeadlessMap, MapOps, MapSnapshot, MarkerView, OverlayView};
pub use sync::{BoundaryRequest, MapSyncEngine, MarkerPhase, ReconcileReport};

pub const MARKER_SIZE_PX: u32 = 34;
pub const SELECTED_MARKER_SIZE_PX: u32 = 44;
const OVERLAY_STROKE_WEIGHT: u32 = 3;
const OVERLAY_FILL_ALPHA: f64 = 0.15;

/// Opaque marker id minted by the map control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MarkerHandle(pub u64);

/// Opaque overlay id minted by the map control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OverlayHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerIcon {
    pub color: &'static str,
    pub selected: bool,
    pub today: bool,
}

impl MarkerIcon {
    pub fn size_px(&self) -> u32 {
        if self.selected {
            SELECTED_MARKER_SIZE_PX
        } else {
            MARKER_SIZE_PX
        }
    }
}

/// Popup text shown when a marker is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerLabel {
    pub title: String,
    pub county: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayStyle {
    pub stroke: &'static str,
    pub weight: u32,
    pub fill: String,
    pub dashed: bool,
}

impl OverlayStyle {
    pub fn for_color(color: &'static str) -> Self {
        Self {
            stroke: color,
            weight: OVERLAY_STROKE_WEIGHT,
            fill: hex_to_rgba(color, OVERLAY_FILL_ALPHA),
            dashed: true,
        }
    }
}

/// How the map should frame its view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Viewport {
    Fit {
        bounds: Bounds,
        padding_px: u32,
        max_zoom: u8,
    },
    Center {
        center: Coordinate,
        zoom: u8,
    },
}

impl Viewport {
    /// Polygons are fitted with padding; circles are centered at a fixed zoom.
    pub fn framing(overlay: &BoundaryOverlay) -> Self {
        match overlay {
            BoundaryOverlay::Polygon { bounds, .. } => Viewport::Fit {
                bounds: *bounds,
                padding_px: BOUNDARY_PADDING_PX,
                max_zoom: BOUNDARY_MAX_ZOOM,
            },
            BoundaryOverlay::Circle { center, .. } => Viewport::Center {
                center: *center,
                zoom: CIRCLE_ZOOM,
            },
        }
    }
}

/// The live map control. Implementations mint handles; the engine only
/// creates, updates and removes through them.
pub trait MapHandle {
    fn add_marker(
        &mut self,
        record_id: &str,
        position: Coordinate,
        icon: &MarkerIcon,
        label: &MarkerLabel,
    ) -> MarkerHandle;
    fn move_marker(&mut self, marker: MarkerHandle, position: Coordinate);
    fn set_marker_icon(&mut self, marker: MarkerHandle, icon: &MarkerIcon);
    fn set_marker_label(&mut self, marker: MarkerHandle, label: &MarkerLabel);
    fn remove_marker(&mut self, marker: MarkerHandle);

    fn add_overlay(&mut self, overlay: &BoundaryOverlay, style: &OverlayStyle) -> OverlayHandle;
    fn remove_overlay(&mut self, overlay: OverlayHandle);

    fn add_user_marker(&mut self, position: Coordinate) -> MarkerHandle;
    fn remove_user_marker(&mut self, marker: MarkerHandle);

    fn set_viewport(&mut self, viewport: Viewport);
}
