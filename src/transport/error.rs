//! Transport error types and handling

use std::fmt;

/// Failures below the HTTP status level
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Could not reach the server (DNS, refused, unreachable)
    Connect { url: String, details: String },
    /// Connect or read deadline expired
    Timeout { url: String, timeout_ms: u64 },
    /// Request could not be built or sent
    Request { url: String, details: String },
    /// Response body could not be read
    Body { url: String, details: String },
    /// HTTP client construction failed
    Setup { details: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect { url, details } => {
                write!(f, "Cannot connect to {}: {}", url, details)
            }
            TransportError::Timeout { url, timeout_ms } => {
                write!(f, "Request to {} timed out after {}ms", url, timeout_ms)
            }
            TransportError::Request { url, details } => {
                write!(f, "Request to {} failed: {}", url, details)
            }
            TransportError::Body { url, details } => {
                write!(f, "Failed to read response from {}: {}", url, details)
            }
            TransportError::Setup { details } => {
                write!(f, "HTTP client setup failed: {}", details)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// Whether the next scheduled attempt is worth making
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportError::Setup { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_url() {
        let error = TransportError::Timeout {
            url: "http://10.0.2.2:3000/ubicaciones".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(
            error.to_string(),
            "Request to http://10.0.2.2:3000/ubicaciones timed out after 5000ms"
        );
    }

    #[test]
    fn test_only_setup_errors_are_fatal() {
        let connect = TransportError::Connect {
            url: "http://x".to_string(),
            details: "refused".to_string(),
        };
        assert!(connect.is_recoverable());
        assert!(!TransportError::Setup { details: "tls".to_string() }.is_recoverable());
    }
}
