//! Error classification for dispatched units.
//!
//! Only failures that prevent a response from arriving are errors here. An
//! HTTP 4xx/5xx response is a completed unit; its status is still bucketed
//! by [`ErrorCategory::from_status_code`] for metrics labelling.

use std::fmt;
use thiserror::Error;

/// Categories used to label failed transports and non-success statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// HTTP 4xx responses
    ClientError,

    /// HTTP 5xx responses
    ServerError,

    /// Network connectivity errors (DNS, connection refused, reset, etc.)
    NetworkError,

    /// Request timeout errors
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize an HTTP status code.
    ///
    /// Returns None for 1xx-3xx statuses.
    pub fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            100..=399 => None,
            400..=499 => Some(ErrorCategory::ClientError),
            500..=599 => Some(ErrorCategory::ServerError),
            _ => Some(ErrorCategory::OtherError),
        }
    }

    /// Categorize a reqwest transport error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return ErrorCategory::TimeoutError;
        }

        let error_msg = full_error_chain(error).to_lowercase();
        if error_msg.contains("certificate") || error_msg.contains("tls") || error_msg.contains("ssl") {
            ErrorCategory::TlsError
        } else if error.is_connect() || error.is_request() || error.is_body() {
            ErrorCategory::NetworkError
        } else if error_msg.contains("timed out") || error_msg.contains("timeout") {
            ErrorCategory::TimeoutError
        } else if error_msg.contains("dns")
            || error_msg.contains("resolve")
            || error_msg.contains("connect")
            || error_msg.contains("connection")
        {
            ErrorCategory::NetworkError
        } else {
            ErrorCategory::OtherError
        }
    }

    /// Get the Prometheus label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::OtherError => "other_error",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "HTTP 4xx Client Errors",
            ErrorCategory::ServerError => "HTTP 5xx Server Errors",
            ErrorCategory::NetworkError => "Network/Connection Errors",
            ErrorCategory::TimeoutError => "Request Timeout Errors",
            ErrorCategory::TlsError => "TLS/SSL Certificate Errors",
            ErrorCategory::OtherError => "Other/Unknown Errors",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Joins an error with all of its sources, outermost first.
///
/// reqwest keeps the interesting part ("connection refused", "dns error")
/// in the source chain rather than in its own message.
pub fn full_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Why a unit ended in the failed state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No response could be obtained from the target.
    #[error("[{}] {message}", .category.label())]
    Transport {
        category: ErrorCategory,
        message: String,
    },

    /// The payload could not be encoded; the request was never sent.
    #[error("failed to serialize order payload: {0}")]
    Serialization(String),

    /// The run was cancelled while the request was in flight.
    #[error("request cancelled before a response arrived")]
    Cancelled,

    /// The unit's task panicked before reporting.
    #[error("dispatch task panicked: {0}")]
    TaskPanicked(String),
}

impl DispatchError {
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        DispatchError::Transport {
            category: ErrorCategory::from_reqwest_error(error),
            message: full_error_chain(error),
        }
    }

    /// Label used for the failures-by-category counter.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchError::Transport { category, .. } => category.label(),
            DispatchError::Serialization(_) => "serialization_error",
            DispatchError::Cancelled => "cancelled",
            DispatchError::TaskPanicked(_) => "task_panicked",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DispatchError::Transport { .. })
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(error: serde_json::Error) -> Self {
        DispatchError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses_are_not_categorized() {
        assert_eq!(ErrorCategory::from_status_code(200), None);
        assert_eq!(ErrorCategory::from_status_code(201), None);
        assert_eq!(ErrorCategory::from_status_code(204), None);
        assert_eq!(ErrorCategory::from_status_code(302), None);
    }

    #[test]
    fn test_categorize_error_statuses() {
        assert_eq!(
            ErrorCategory::from_status_code(404),
            Some(ErrorCategory::ClientError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(429),
            Some(ErrorCategory::ClientError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(503),
            Some(ErrorCategory::ServerError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(600),
            Some(ErrorCategory::OtherError)
        );
    }

    #[test]
    fn test_transport_error_display_includes_label() {
        let err = DispatchError::Transport {
            category: ErrorCategory::NetworkError,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "[network_error] connection refused");
        assert_eq!(err.label(), "network_error");
        assert!(err.is_transport());
    }

    #[test]
    fn test_non_transport_labels() {
        assert_eq!(DispatchError::Cancelled.label(), "cancelled");
        assert_eq!(
            DispatchError::Serialization("bad".to_string()).label(),
            "serialization_error"
        );
        assert!(!DispatchError::Cancelled.is_transport());
    }

    #[test]
    fn test_serde_error_converts_to_serialization() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: DispatchError = json_err.into();
        assert!(matches!(err, DispatchError::Serialization(_)));
    }

    #[test]
    fn test_full_error_chain_walks_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        let chain = full_error_chain(&outer);
        assert!(chain.contains("refused"));
    }
}
