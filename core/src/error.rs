//! Error types for the Socrata client core.
//!
//! # Design
//! The public request contract resolves failures into sentinels (`None`,
//! `false`), so these types mostly travel on the `try_*` paths and inside
//! log events. `RequestError` keeps the two failure classes of a round-trip
//! apart: the request never completed (`Transport`) or it completed with a
//! status other than 200 (`Status`).

use thiserror::Error;

/// Failure raised by a `Transport` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP library failed: connection refused, timeout, I/O error,
    /// malformed response.
    #[error("HTTP transport failed: {0}")]
    Http(#[from] ureq::Error),

    /// The request descriptor could not be turned into a wire request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Why a request did not produce a payload.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("error performing request on {uri}: {source}")]
    Transport {
        uri: String,
        #[source]
        source: TransportError,
    },

    /// The server answered with anything but 200.
    #[error("got status {status} {reason} while performing request on {uri}")]
    Status {
        status: u16,
        reason: String,
        uri: String,
    },
}

impl RequestError {
    /// Status code for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Transport { .. } => None,
        }
    }

    /// True for failures worth another attempt: transport errors and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport { .. } => true,
            RequestError::Status { status, .. } => (500..600).contains(status),
        }
    }
}

/// Rejected `ClientConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must not be zero")]
    ZeroPort,

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

/// An HTTP verb outside the supported set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported HTTP method: {0}")]
pub struct MethodParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_retry_only_on_server_errors() {
        let err = RequestError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
            uri: "http://h:80/x".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(503));

        let err = RequestError::Status {
            status: 404,
            reason: "Not Found".to_string(),
            uri: "http://h:80/x".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = RequestError::Transport {
            uri: "http://h:80/x".to_string(),
            source: TransportError::InvalidRequest("bad uri".to_string()),
        };
        assert!(err.is_retryable());
        assert_eq!(err.status(), None);
        assert_eq!(
            err.to_string(),
            "error performing request on http://h:80/x: invalid request: bad uri"
        );
    }

    #[test]
    fn status_error_message_names_uri() {
        let err = RequestError::Status {
            status: 401,
            reason: "Unauthorized".to_string(),
            uri: "http://h:80/batches".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "got status 401 Unauthorized while performing request on http://h:80/batches"
        );
    }
}
