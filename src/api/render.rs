//! Render payloads for the map view

use crate::algorithms::projection::GeoProjector;
use crate::core::{GeoPoint, NormalizedPoint, PlayerId};
use crate::processing::registry::RegistrySnapshot;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where the resolved self position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelfSource {
    Server,
    LocalGps,
    Default,
}

/// Everything a view needs to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub self_point: NormalizedPoint,
    pub self_source: SelfSource,
    pub others: BTreeMap<PlayerId, NormalizedPoint>,
    /// Sync generation the frame was built from
    pub generation: u64,
}

impl RenderFrame {
    pub fn from_snapshot(
        snapshot: &RegistrySnapshot,
        projector: &GeoProjector,
        default_center: GeoPoint,
    ) -> Self {
        let self_source = if snapshot.self_confirmed.is_some() {
            SelfSource::Server
        } else if snapshot.self_last_local.is_some() {
            SelfSource::LocalGps
        } else {
            SelfSource::Default
        };
        let self_position = snapshot.resolve_self_position(default_center);

        let others = snapshot
            .others
            .iter()
            .map(|(id, player)| (id.clone(), projector.project(&player.position)))
            .collect();

        Self {
            self_point: projector.project(&self_position),
            self_source,
            others,
            generation: snapshot.sync_generation,
        }
    }
}

/// Pixel rectangle the map image occupies inside its view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ImageRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rect of an image scaled to fit inside the view, centred, aspect kept.
    /// `None` if either size is not positive.
    pub fn fit_center(view_w: f32, view_h: f32, image_w: f32, image_h: f32) -> Option<Self> {
        if !(view_w > 0.0 && view_h > 0.0 && image_w > 0.0 && image_h > 0.0) {
            return None;
        }
        let scale = (view_w / image_w).min(view_h / image_h);
        let width = image_w * scale;
        let height = image_h * scale;
        Some(Self::new(
            (view_w - width) / 2.0,
            (view_h - height) / 2.0,
            width,
            height,
        ))
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Top-left pixel for a marker centred on `point`.
    ///
    /// Returns `None` while the image has not been laid out yet.
    pub fn place_marker(
        &self,
        point: NormalizedPoint,
        marker_w: f32,
        marker_h: f32,
    ) -> Option<(f32, f32)> {
        if !self.is_valid() {
            return None;
        }
        let x = self.left + point.x * self.width - marker_w / 2.0;
        let y = self.top + point.y * self.height - marker_h / 2.0;
        Some((x, y))
    }
}
