//! HTTP transport on a blocking `reqwest` client

use crate::core::{REPORT_PATH, ROSTER_PATH};
use crate::processing::parser::LocationPayload;
use crate::transport::{PositionTransport, ServerReply, TransportError, TransportResult};
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::debug;

/// Talks to the position server over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    report_url: String,
    roster_url: String,
    read_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport for `server_base` (e.g. `http://192.168.0.100:3000`).
    ///
    /// `connect_timeout` bounds connection setup; `read_timeout` is the
    /// deadline for the whole exchange, connection setup included, so a
    /// larger connect timeout has no effect.
    pub fn new(
        server_base: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| TransportError::Setup {
                details: e.to_string(),
            })?;

        let base = server_base.trim_end_matches('/');
        Ok(Self {
            client,
            report_url: format!("{}{}", base, REPORT_PATH),
            roster_url: format!("{}{}", base, ROSTER_PATH),
            read_timeout,
        })
    }

    pub fn report_url(&self) -> &str {
        &self.report_url
    }

    pub fn roster_url(&self) -> &str {
        &self.roster_url
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout_ms: self.read_timeout.as_millis() as u64,
            }
        } else if error.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
                details: error.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                details: error.to_string(),
            }
        }
    }

    fn into_reply(&self, url: &str, response: Response) -> TransportResult<ServerReply> {
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| {
            if e.is_timeout() {
                self.map_error(url, e)
            } else {
                TransportError::Body {
                    url: url.to_string(),
                    details: e.to_string(),
                }
            }
        })?;
        Ok(ServerReply { status, body })
    }
}

impl PositionTransport for HttpTransport {
    fn post_location(&self, payload: &LocationPayload) -> TransportResult<ServerReply> {
        debug!(url = %self.report_url, "POST location");
        let response = self
            .client
            .post(&self.report_url)
            .json(payload)
            .send()
            .map_err(|e| self.map_error(&self.report_url, e))?;
        self.into_reply(&self.report_url, response)
    }

    fn fetch_roster(&self) -> TransportResult<ServerReply> {
        debug!(url = %self.roster_url, "GET roster");
        let response = self
            .client
            .get(&self.roster_url)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| self.map_error(&self.roster_url, e))?;
        self.into_reply(&self.roster_url, response)
    }
}
