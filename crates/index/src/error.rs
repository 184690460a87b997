use std::fmt::Display;
use thiserror::Error;

/// Failures of the vector store, graph store and embedding services.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Malformed input from the caller. Not retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The named vector collection does not exist. Configuration bug, not retried.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Embedding model and collection disagree on vector length. Fatal.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Transient network or service failure. Safe to retry.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// The service answered but rejected the request or sent something unreadable.
    #[error("{service} error: {message}")]
    Backend {
        service: &'static str,
        message: String,
    },
}

pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    pub fn unavailable(service: &'static str, message: impl Display) -> Self {
        IndexError::Unavailable {
            service,
            message: message.to_string(),
        }
    }

    pub fn backend(service: &'static str, message: impl Display) -> Self {
        IndexError::Backend {
            service,
            message: message.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Unavailable { .. })
    }

    /// Transport-level reqwest failure
    pub fn from_http(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::backend(service, err)
        } else {
            Self::unavailable(service, err)
        }
    }

    /// Non-success HTTP status
    pub fn from_status(service: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{} {}", status, body.trim());
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::unavailable(service, message)
        } else {
            Self::backend(service, message)
        }
    }
}
