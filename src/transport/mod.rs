//! Transport layer for the position server
//!
//! The server exposes two exchanges: posting this device's location and
//! fetching the full roster. Both sit behind [`PositionTransport`] so the
//! reporter and poller can run against real HTTP or a scripted mock.

pub mod error;
pub mod http;
pub mod mock;

pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use mock::MockTransport;

use crate::processing::parser::LocationPayload;

/// Status line and body of a server response
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReply {
    pub status: u16,
    pub body: String,
}

impl ServerReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking access to the position server.
///
/// Implementations are shared between worker threads and must bound every
/// call with their own timeouts.
pub trait PositionTransport: Send + Sync {
    /// `POST /ubicacion` with the JSON payload
    fn post_location(&self, payload: &LocationPayload) -> TransportResult<ServerReply>;

    /// `GET /ubicaciones`
    fn fetch_roster(&self) -> TransportResult<ServerReply>;
}
