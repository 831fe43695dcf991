use core::fmt;
use std::error::Error;


/// Different `Flink` SQL Gateway error types.
#[derive(Debug)]
#[non_exhaustive]
pub enum FlinkError {
    /// The request never produced an HTTP response (DNS, connect, timeout, broken body).
    Connection(reqwest::Error),
    /// The gateway answered with a non-2xx status. `body` is kept verbatim.
    Gateway { status: u16, body: String },
    OperationFailed(String),
    OperationCanceled,
    ContextCanceled,
    DeadlineExceeded,
    Decode {
        column: String,
        remote_type: String,
        cause: String,
    },
    CursorClosed,
    SessionClosed,
    Config(String),
    /// A 2xx response that does not honour the wire contract.
    Protocol(String),
}

impl FlinkError {
    /// True for the two errors produced by a [`Context`](crate::Context) that is done.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FlinkError::ContextCanceled | FlinkError::DeadlineExceeded)
    }

    /// The HTTP status of a [`FlinkError::Gateway`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            FlinkError::Gateway { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Messages from a gateway error body shaped like `{"errors": [...]}`.
    ///
    /// Returns an empty list when the body is not structured that way.
    pub fn gateway_messages(&self) -> Vec<String> {
        let FlinkError::Gateway { body, .. } = self else {
            return vec![];
        };

        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("errors").and_then(|e| e.as_array()).cloned())
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| match e.as_str() {
                        Some(s) => s.to_string(),
                        None => e.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn decode(column: &str, remote_type: &str, cause: impl Into<String>) -> Self {
        FlinkError::Decode {
            column: column.to_string(),
            remote_type: remote_type.to_string(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for FlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlinkError::Connection(e) => write!(f, "Connection Error: {}", e),
            FlinkError::Gateway { status, body } => write!(f, "Gateway Error ({}): {}", status, body),
            FlinkError::OperationFailed(msg) => write!(f, "Operation Failed: {}", msg),
            FlinkError::OperationCanceled => write!(f, "Operation Canceled"),
            FlinkError::ContextCanceled => write!(f, "Context Canceled"),
            FlinkError::DeadlineExceeded => write!(f, "Deadline Exceeded"),
            FlinkError::Decode { column, remote_type, cause } => write!(
                f, "Decode Error: column '{}' of type {}: {}", column, remote_type, cause
            ),
            FlinkError::CursorClosed => write!(f, "Cursor Closed"),
            FlinkError::SessionClosed => write!(f, "Session Closed"),
            FlinkError::Config(msg) => write!(f, "Invalid Configuration: {}", msg),
            FlinkError::Protocol(msg) => write!(f, "Protocol Violation: {}", msg),
        }
    }
}

impl Error for FlinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FlinkError::Connection(source) => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FlinkError {
    fn from(error: reqwest::Error) -> Self {
        FlinkError::Connection(error)
    }
}

impl From<url::ParseError> for FlinkError {
    fn from(error: url::ParseError) -> Self {
        FlinkError::Config(error.to_string())
    }
}

impl From<serde_json::Error> for FlinkError {
    fn from(error: serde_json::Error) -> Self {
        FlinkError::Protocol(error.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FlinkError>;
