//! Client configuration: defaults, JSON file loading, environment
//! overrides and validation.

use crate::core::{
    GeoPoint, MapBounds, PlayerId, DEFAULT_BOUNDS, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_LOCATION_INTERVAL_MS, DEFAULT_MAX_QUEUED_REPORTS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_REPORT_WORKERS, DEFAULT_SERVER_BASE,
    EMULATOR_LOOPBACK_BASE, FALLBACK_PLAYER_ID,
};
use crate::validation::{validate_bounds, Axis, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_SERVER_BASE: &str = "MAPSYNC_SERVER_BASE";
pub const ENV_PLAYER_ID: &str = "MAPSYNC_PLAYER_ID";
pub const ENV_POLL_INTERVAL_MS: &str = "MAPSYNC_POLL_INTERVAL_MS";

/// Configuration errors. Any of these is fatal at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Invalid parameter value
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Bounds with a zero or negative span on an axis
    DegenerateBounds { axis: Axis, reason: String },
    /// Configuration file I/O error
    IoError { message: String },
    /// JSON serialization/deserialization error
    SerializationError { message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidParameter { parameter, value, reason } => {
                write!(f, "Invalid parameter '{}' = '{}': {}", parameter, value, reason)
            }
            ConfigError::DegenerateBounds { axis, reason } => {
                write!(f, "Degenerate map bounds on {} axis: {}", axis, reason)
            }
            ConfigError::IoError { message } => {
                write!(f, "I/O error: {}", message)
            }
            ConfigError::SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything a session needs to know at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the position server, without trailing slash
    pub server_base: String,
    /// Talk to the emulator host loopback instead of `server_base`
    pub use_emulator_loopback: bool,
    /// Explicit player id; the platform id is used when absent
    pub player_id: Option<String>,
    /// Geographic rectangle covered by the map image
    pub bounds: MapBounds,
    /// Reject inverted longitude bounds instead of warning
    pub strict_axes: bool,
    /// Self position shown before any fix; bounds centre when absent
    pub default_center: Option<GeoPoint>,
    /// Roster poll period (milliseconds)
    pub poll_interval_ms: u64,
    /// Minimum interval between location samples (milliseconds)
    pub location_interval_ms: u64,
    /// Connection setup limit (milliseconds)
    pub connect_timeout_ms: u64,
    /// Deadline for a whole exchange, connection setup included (milliseconds)
    pub read_timeout_ms: u64,
    /// Worker threads for outbound reports
    pub report_workers: usize,
    /// Reports waiting beyond this are dropped
    pub max_queued_reports: usize,
    /// Ignore samples closer than this to the last accepted one (meters)
    pub min_movement_m: Option<f64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_base: DEFAULT_SERVER_BASE.to_string(),
            use_emulator_loopback: false,
            player_id: None,
            bounds: DEFAULT_BOUNDS,
            strict_axes: false,
            default_center: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            location_interval_ms: DEFAULT_LOCATION_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            report_workers: DEFAULT_REPORT_WORKERS,
            max_queued_reports: DEFAULT_MAX_QUEUED_REPORTS,
            min_movement_m: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file. Missing keys take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config file '{}': {}", path_str, e),
        })
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            }
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Apply `MAPSYNC_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_SERVER_BASE) {
            self.server_base = base;
        }
        if let Some(id) = lookup(ENV_PLAYER_ID) {
            self.player_id = Some(id);
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidParameter {
                        parameter: ENV_POLL_INTERVAL_MS.to_string(),
                        value: raw.clone(),
                        reason: "expected an integer number of milliseconds".to_string(),
                    })?;
        }
        Ok(())
    }

    /// Validate every parameter. Bounds warnings are carried in the result.
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate_bounds(&self.bounds, self.strict_axes);

        if !self.server_base.starts_with("http://") && !self.server_base.starts_with("https://") {
            result.errors.push(ConfigError::InvalidParameter {
                parameter: "server_base".to_string(),
                value: self.server_base.clone(),
                reason: "must be an http:// or https:// URL".to_string(),
            });
        }

        let intervals = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("location_interval_ms", self.location_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                result.errors.push(ConfigError::InvalidParameter {
                    parameter: name.to_string(),
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.connect_timeout_ms > self.read_timeout_ms {
            result.errors.push(ConfigError::InvalidParameter {
                parameter: "connect_timeout_ms".to_string(),
                value: self.connect_timeout_ms.to_string(),
                reason: format!(
                    "exceeds read_timeout_ms ({}), which bounds the whole request",
                    self.read_timeout_ms
                ),
            });
        }

        if self.report_workers == 0 {
            result.errors.push(ConfigError::InvalidParameter {
                parameter: "report_workers".to_string(),
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        if let Some(center) = self.default_center {
            if !center.lat.is_finite() || !center.lon.is_finite() {
                result.errors.push(ConfigError::InvalidParameter {
                    parameter: "default_center".to_string(),
                    value: format!("{:?}", center),
                    reason: "must be finite".to_string(),
                });
            }
        }

        if let Some(min_movement) = self.min_movement_m {
            if !min_movement.is_finite() || min_movement < 0.0 {
                result.errors.push(ConfigError::InvalidParameter {
                    parameter: "min_movement_m".to_string(),
                    value: min_movement.to_string(),
                    reason: "must be a non-negative distance".to_string(),
                });
            }
        }

        result
    }

    /// Server base actually used for requests
    pub fn effective_server_base(&self) -> &str {
        if self.use_emulator_loopback {
            EMULATOR_LOOPBACK_BASE
        } else {
            self.server_base.trim_end_matches('/')
        }
    }

    /// Pick the local player id: explicit config, then the platform id,
    /// then the fixed fallback
    pub fn resolve_player_id(&self, platform_id: Option<&str>) -> PlayerId {
        self.player_id
            .as_deref()
            .or(platform_id)
            .filter(|id| !id.trim().is_empty())
            .map(PlayerId::new)
            .unwrap_or_else(|| PlayerId::new(FALLBACK_PLAYER_ID))
    }

    pub fn default_center_point(&self) -> GeoPoint {
        self.default_center.unwrap_or_else(|| self.bounds.center())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
