//! Common error types for ISA

use thiserror::Error;

/// Common result type for ISA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the backend client and shared infrastructure
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure (connection refused, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Backend rejected the bearer token (HTTP 401)
    ///
    /// Re-authentication happens outside this crate.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backend returned a non-success status
    #[error("Backend error {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Event stream failed or closed
    #[error("Event stream error: {0}")]
    Stream(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True when the caller must obtain a fresh token before retrying
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// True when the backend no longer knows the requested resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Http { status: 404, .. })
    }

    /// True for failures that a plain retry may fix
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) | Error::Stream(_) => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                Error::Unauthorized(err.to_string())
            } else {
                Error::Http {
                    status: status.as_u16(),
                    message: err.to_string(),
                }
            }
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
