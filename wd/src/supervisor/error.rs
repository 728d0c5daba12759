//! Supervisor RPC error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to supervisord
///
/// Every variant is a transport-level fault: the watchdog cannot tell whether
/// the supervised processes are alive, so callers treat these as fatal.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Cannot connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("Malformed HTTP response: {0}")]
    MalformedHttp(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Malformed XML-RPC response: {0}")]
    MalformedResponse(String),

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },
}

impl RpcError {
    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        RpcError::Xml(err.to_string())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        RpcError::MalformedResponse(msg.into())
    }

    /// Check if the supervisor could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RpcError::Connect { .. })
    }

    /// Check if the server answered with an XML-RPC fault
    pub fn is_fault(&self) -> bool {
        matches!(self, RpcError::Fault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unreachable() {
        let err = RpcError::Connect {
            path: PathBuf::from("/run/supervisor.sock"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_unreachable());
        assert!(!err.is_fault());
        assert!(err.to_string().contains("/run/supervisor.sock"));
    }

    #[test]
    fn test_is_fault() {
        let err = RpcError::Fault {
            code: 10,
            message: "BAD_NAME: epidose:nope".to_string(),
        };
        assert!(err.is_fault());
        assert!(!err.is_unreachable());
        assert_eq!(err.to_string(), "XML-RPC fault 10: BAD_NAME: epidose:nope");
    }
}
