//! Core data types for map position sharing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Fixed geographic rectangle covered by the map image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl MapBounds {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Geographic midpoint of the rectangle
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.lat_min + self.lat_max) / 2.0,
            lon: (self.lon_min + self.lon_max) / 2.0,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }
}

/// Position as fractions of the map image width and height.
///
/// `y` grows southwards: the northern edge of the bounds is `y = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_in_unit_square(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Opaque, installation-stable player identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        PlayerId::new(id)
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        PlayerId(id)
    }
}

/// Last known position of one player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPosition {
    pub id: PlayerId,
    pub position: GeoPoint,
}

impl PlayerPosition {
    pub fn new(id: impl Into<PlayerId>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            position: GeoPoint::new(lat, lon),
        }
    }
}

/// Roster after splitting the local player from everyone else
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    pub others: Vec<PlayerPosition>,
    pub self_position: Option<PlayerPosition>,
}
