//! Map bounds validation
//!
//! Bounds are checked once at startup. Degenerate or non-finite bounds are
//! errors; an inverted longitude axis is reported as a warning unless strict
//! axis checking is requested, since the shipped field bounds are inverted
//! and nothing here can tell which orientation the map image really uses.

use crate::core::MapBounds;
use crate::utils::config::ConfigError;
use std::fmt;

/// Map axis a validation finding refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => write!(f, "latitude"),
            Axis::Longitude => write!(f, "longitude"),
        }
    }
}

/// Non-fatal findings
#[derive(Debug, Clone, PartialEq)]
pub enum BoundsWarning {
    /// `max < min` on an axis; projection still works but the map is mirrored
    /// on that axis relative to a north-up, east-right image
    AxisInverted { axis: Axis, min: f64, max: f64 },
}

impl fmt::Display for BoundsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsWarning::AxisInverted { axis, min, max } => {
                write!(f, "{} axis inverted: max {} < min {}", axis, max, min)
            }
        }
    }
}

/// Outcome of a validation pass
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<BoundsWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any, for callers that want a plain `Result`
    pub fn into_result(self) -> Result<Vec<BoundsWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.warnings),
        }
    }
}

/// Check bounds for use by the projector.
///
/// With `strict_axes` an inverted longitude axis becomes an error instead of
/// a warning. Latitude must always satisfy `lat_max > lat_min`.
pub fn validate_bounds(bounds: &MapBounds, strict_axes: bool) -> ValidationResult {
    let mut result = ValidationResult::default();

    let fields = [
        ("lat_min", bounds.lat_min),
        ("lat_max", bounds.lat_max),
        ("lon_min", bounds.lon_min),
        ("lon_max", bounds.lon_max),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            result.errors.push(ConfigError::InvalidParameter {
                parameter: format!("bounds.{}", name),
                value: value.to_string(),
                reason: "must be a finite number".to_string(),
            });
        }
    }
    if !result.errors.is_empty() {
        return result;
    }

    if bounds.lat_min < -90.0 || bounds.lat_max > 90.0 {
        result.errors.push(ConfigError::InvalidParameter {
            parameter: "bounds.lat".to_string(),
            value: format!("{}..{}", bounds.lat_min, bounds.lat_max),
            reason: "latitude must be between -90 and 90 degrees".to_string(),
        });
    }

    if bounds.lat_max == bounds.lat_min {
        result.errors.push(ConfigError::DegenerateBounds {
            axis: Axis::Latitude,
            reason: "lat_max equals lat_min".to_string(),
        });
    } else if bounds.lat_max < bounds.lat_min {
        result.errors.push(ConfigError::DegenerateBounds {
            axis: Axis::Latitude,
            reason: format!(
                "lat_max {} must be greater than lat_min {}",
                bounds.lat_max, bounds.lat_min
            ),
        });
    }

    if bounds.lon_max == bounds.lon_min {
        result.errors.push(ConfigError::DegenerateBounds {
            axis: Axis::Longitude,
            reason: "lon_max equals lon_min".to_string(),
        });
    } else if bounds.lon_max < bounds.lon_min {
        if strict_axes {
            result.errors.push(ConfigError::DegenerateBounds {
                axis: Axis::Longitude,
                reason: format!(
                    "lon_max {} is less than lon_min {} (strict axes)",
                    bounds.lon_max, bounds.lon_min
                ),
            });
        } else {
            result.warnings.push(BoundsWarning::AxisInverted {
                axis: Axis::Longitude,
                min: bounds.lon_min,
                max: bounds.lon_max,
            });
        }
    }

    result
}
