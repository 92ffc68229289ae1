//! Common API types: outcomes, errors and counters

use crate::processing::parser::ParseError;
use crate::transport::TransportError;
use std::fmt;

/// Result type for API operations
pub type ApiResult<T> = Result<T, SyncError>;

/// Why a sync cycle did not update the registry
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Network-level failure
    Transport(TransportError),
    /// Non-2xx status
    ServerRejected { status: u16, body: String },
    /// Roster body could not be decoded
    Parse(ParseError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Transport(error) => write!(f, "Transport error: {}", error),
            SyncError::ServerRejected { status, body } if body.is_empty() => {
                write!(f, "Server rejected request with status {}", status)
            }
            SyncError::ServerRejected { status, body } => {
                write!(f, "Server rejected request with status {}: {}", status, body)
            }
            SyncError::Parse(error) => write!(f, "Parse error: {}", error),
        }
    }
}

impl SyncError {
    /// Whether the next scheduled cycle may succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Transport(error) => error.is_recoverable(),
            SyncError::ServerRejected { .. } | SyncError::Parse(_) => true,
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Transport(error) => Some(error),
            SyncError::Parse(error) => Some(error),
            SyncError::ServerRejected { .. } => None,
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        SyncError::Transport(error)
    }
}

impl From<ParseError> for SyncError {
    fn from(error: ParseError) -> Self {
        SyncError::Parse(error)
    }
}

/// Outcome of one location report
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Server answered 2xx
    Sent { status: u16 },
    TransportError(TransportError),
    ServerRejected { code: u16, body: String },
}

impl ReportOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ReportOutcome::Sent { .. })
    }
}

/// Poll cycle state machine: Idle → Fetching → (Applying | Failed) → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Applying,
    Failed,
}

/// What a single `tick` did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Roster applied to the registry
    Applied { remote_players: usize, self_confirmed: bool },
    /// Cycle aborted; registry untouched
    Failed(SyncError),
    /// Another cycle was already in flight
    Skipped,
}

/// Poller counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
}

/// Reporter counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub sent: u64,
    pub failed: u64,
    /// Samples discarded because the report queue was full
    pub dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let rejected = SyncError::ServerRejected {
            status: 503,
            body: String::new(),
        };
        assert_eq!(rejected.to_string(), "Server rejected request with status 503");

        let parse: SyncError = ParseError::NotAnArray {
            found: "object".to_string(),
        }
        .into();
        assert_eq!(parse.to_string(), "Parse error: Roster is not an array, got object");
    }

    #[test]
    fn test_only_setup_failures_are_unrecoverable() {
        let setup: SyncError = TransportError::Setup {
            details: "tls backend".to_string(),
        }
        .into();
        assert!(!setup.is_recoverable());

        let timeout: SyncError = TransportError::Timeout {
            url: "http://x/ubicaciones".to_string(),
            timeout_ms: 5000,
        }
        .into();
        assert!(timeout.is_recoverable());
        assert!(SyncError::ServerRejected {
            status: 500,
            body: String::new()
        }
        .is_recoverable());
    }
}
