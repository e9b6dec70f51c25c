//! Query error types
//!
//! Defines all error conditions that can occur while resolving patterns
//! and fetching aligned series.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during find/fetch operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// A metric path had an empty segment or was empty
    #[error("Invalid metric path: {0}")]
    InvalidPath(String),

    /// A glob pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A fetch window that cannot be laid onto a grid
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    /// Unknown resolution tag, missing alias mapping, bad limits
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single metric id can never fit into a request under the configured limits
    #[error("Metric {metric} needs {size} bytes but a request allows fewer than {max_bytes}")]
    BatchOverflow {
        metric: String,
        size: usize,
        max_bytes: usize,
    },

    /// The metrics store failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl QueryError {
    /// Whether the error was caused by the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QueryError::InvalidPath(_) | QueryError::InvalidPattern(_) | QueryError::InvalidWindow(_)
        )
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
