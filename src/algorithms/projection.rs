//! Geographic to normalized map-space projection
//!
//! The map is a fixed equirectangular crop, so projection is a per-axis
//! linear rescale followed by a clamp to the unit square. Points outside the
//! bounds are pinned to the nearest edge rather than dropped.

use crate::core::{GeoPoint, MapBounds, NormalizedPoint};
use crate::utils::config::ConfigError;
use crate::validation::{validate_bounds, BoundsWarning};

/// Projector bound to one validated set of map bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoProjector {
    bounds: MapBounds,
}

impl GeoProjector {
    /// Validate `bounds` and build a projector. Inverted longitude bounds are
    /// accepted; use [`GeoProjector::with_warnings`] to inspect them.
    pub fn new(bounds: MapBounds) -> Result<Self, ConfigError> {
        Self::with_warnings(bounds, false).map(|(projector, _)| projector)
    }

    /// Like `new`, returning validation warnings and honoring `strict_axes`
    pub fn with_warnings(
        bounds: MapBounds,
        strict_axes: bool,
    ) -> Result<(Self, Vec<BoundsWarning>), ConfigError> {
        let warnings = validate_bounds(&bounds, strict_axes).into_result()?;
        Ok((GeoProjector { bounds }, warnings))
    }

    pub fn bounds(&self) -> &MapBounds {
        &self.bounds
    }

    pub fn project(&self, point: &GeoPoint) -> NormalizedPoint {
        let x = (point.lon - self.bounds.lon_min) / self.bounds.lon_span();
        let y = 1.0 - (point.lat - self.bounds.lat_min) / self.bounds.lat_span();

        NormalizedPoint {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

/// One-shot projection against bounds that have not been validated yet
pub fn project(point: &GeoPoint, bounds: &MapBounds) -> Result<NormalizedPoint, ConfigError> {
    GeoProjector::new(*bounds).map(|projector| projector.project(point))
}

/// Clamp to [0, 1]; NaN lands in the middle of the axis
fn clamp_unit(value: f64) -> f32 {
    if value.is_nan() {
        0.5
    } else {
        value.clamp(0.0, 1.0) as f32
    }
}
