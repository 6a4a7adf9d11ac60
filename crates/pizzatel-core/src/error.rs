//! Shared error type across pizzatel crates.

use thiserror::Error;

/// Stable error codes (used in logs and by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid configuration value or malformed document.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Network error, timeout, or client construction failure.
    Transport,
    /// Collector answered with a non-success status.
    Status,
    /// Payload could not be serialized.
    Encode,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Status => "STATUS",
            ErrorCode::Encode => "ENCODE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PizzatelError>;

/// Unified error type used by core and service.
#[derive(Debug, Error)]
pub enum PizzatelError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("transport: {0}")]
    Transport(String),
    #[error("collector returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("encode: {0}")]
    Encode(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PizzatelError {
    /// Map the error to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PizzatelError::BadRequest(_) => ErrorCode::BadRequest,
            PizzatelError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            PizzatelError::Transport(_) => ErrorCode::Transport,
            PizzatelError::Status { .. } => ErrorCode::Status,
            PizzatelError::Encode(_) => ErrorCode::Encode,
            PizzatelError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<serde_json::Error> for PizzatelError {
    fn from(e: serde_json::Error) -> Self {
        PizzatelError::Encode(e.to_string())
    }
}
