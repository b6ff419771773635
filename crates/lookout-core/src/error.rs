use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for Lookout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (bad URL, non-2xx status, unreadable body).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Target answered 429.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// An operation needs at least one tracked source.
    #[error("No sources are tracked")]
    EmptyRegistry,

    /// Periodic interval must be greater than zero.
    #[error("Interval must be positive, got {0:?}")]
    InvalidInterval(Duration),

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted file exists but is not well-formed.
    #[error("Malformed file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// CSV export failed.
    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error came from talking to a source
    /// rather than from local state or persistence.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::NetworkError(_)
        )
    }
}
