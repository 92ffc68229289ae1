//! Protocol constants and shipped defaults

use super::types::MapBounds;

/// Endpoint receiving this device's location
pub const REPORT_PATH: &str = "/ubicacion";

/// Endpoint returning the full roster
pub const ROSTER_PATH: &str = "/ubicaciones";

pub const DEFAULT_SERVER_BASE: &str = "http://192.168.0.100:3000";

/// Host loopback as seen from an Android emulator
pub const EMULATOR_LOOPBACK_BASE: &str = "http://10.0.2.2:3000";

/// Used when the platform cannot provide an installation id
pub const FALLBACK_PLAYER_ID: &str = "jugador_local";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_LOCATION_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_REPORT_WORKERS: usize = 2;
pub const DEFAULT_MAX_QUEUED_REPORTS: usize = 4;

/// Bounds of the playing field image. Note lon_max < lon_min here.
pub const DEFAULT_BOUNDS: MapBounds = MapBounds {
    lat_min: 41.788412,
    lat_max: 41.790269,
    lon_min: 2.771154,
    lon_max: 2.762952,
};

/// WGS84 semi-major axis (m)
pub const EARTH_RADIUS_WGS84: f64 = 6_378_137.0;

/// WGS84 first eccentricity squared
pub const ECCENTRICITY_SQUARED_WGS84: f64 = 6.694_379_990_14e-3;
