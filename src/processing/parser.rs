//! Roster payload decoding
//!
//! The roster endpoint returns a JSON array of
//! `{"jugador_id": string, "lat": number, "lng": number}` objects. Decoding
//! is deliberately lenient per field: a missing or non-numeric coordinate
//! becomes 0.0 and a missing id becomes `p_<index>`, so every entry the
//! server sent is kept. Structural problems (body not an array, entry not an
//! object) abort the whole roster.

use crate::core::{PlayerId, PlayerPosition, SyncResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

pub const FIELD_PLAYER_ID: &str = "jugador_id";
pub const FIELD_LAT: &str = "lat";
pub const FIELD_LNG: &str = "lng";

/// Outbound location report body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPayload {
    #[serde(rename = "jugador_id")]
    pub player_id: String,
    pub lat: f64,
    pub lng: f64,
}

/// Errors that abort a roster decode
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Body is not valid JSON
    InvalidJson { details: String },
    /// Top-level value is not an array
    NotAnArray { found: String },
    /// An element of the array is not an object
    InvalidEntry { index: usize, found: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidJson { details } => write!(f, "Invalid roster JSON: {}", details),
            ParseError::NotAnArray { found } => write!(f, "Roster is not an array, got {}", found),
            ParseError::InvalidEntry { index, found } => {
                write!(f, "Roster entry {} is not an object, got {}", index, found)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Decodes roster bodies and splits out the local player
#[derive(Debug, Clone)]
pub struct RosterParser {
    local_id: PlayerId,
}

impl RosterParser {
    pub fn new(local_id: PlayerId) -> Self {
        Self { local_id }
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    /// Decode and partition a roster body
    pub fn parse(&self, body: &str) -> Result<SyncResult, ParseError> {
        let entries = parse_entries(body)?;
        Ok(partition(entries, &self.local_id))
    }
}

/// Decode every roster entry, in server order
pub fn parse_entries(body: &str) -> Result<Vec<PlayerPosition>, ParseError> {
    let value: Value = serde_json::from_str(body).map_err(|e| ParseError::InvalidJson {
        details: e.to_string(),
    })?;

    let array = match value {
        Value::Array(array) => array,
        other => {
            return Err(ParseError::NotAnArray {
                found: json_kind(&other).to_string(),
            })
        }
    };

    array
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(fields) => Ok(decode_entry(index, fields)),
            other => Err(ParseError::InvalidEntry {
                index,
                found: json_kind(other).to_string(),
            }),
        })
        .collect()
}

/// Split entries into the local player and everyone else.
///
/// If the local id appears more than once the last occurrence wins.
pub fn partition(entries: Vec<PlayerPosition>, local_id: &PlayerId) -> SyncResult {
    let mut result = SyncResult::default();
    for entry in entries {
        if entry.id == *local_id {
            result.self_position = Some(entry);
        } else {
            result.others.push(entry);
        }
    }
    result
}

fn decode_entry(index: usize, fields: &Map<String, Value>) -> PlayerPosition {
    let id = match fields.get(FIELD_PLAYER_ID) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        Some(Value::Bool(id)) => id.to_string(),
        _ => format!("p_{}", index),
    };

    PlayerPosition::new(
        id,
        lenient_f64(fields.get(FIELD_LAT)),
        lenient_f64(fields.get(FIELD_LNG)),
    )
}

fn lenient_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
