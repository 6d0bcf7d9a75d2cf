//! Error types for the Nomad data source.

use thiserror::Error;

/// Result type alias for data source operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur while querying Nomad.
///
/// Transport failures, non-2xx responses, timeouts and malformed payloads
/// all collapse into the single `FetchFailed` kind; callers decide what a
/// failure means for them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{operation} failed: {cause}")]
    FetchFailed {
        /// Name of the data source operation, e.g. `list_jobs`.
        operation: &'static str,
        /// Human-readable description of what went wrong.
        cause: String,
    },
}

impl ApiError {
    pub fn fetch_failed(operation: &'static str, cause: impl Into<String>) -> Self {
        ApiError::FetchFailed {
            operation,
            cause: cause.into(),
        }
    }

    /// The operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            ApiError::FetchFailed { operation, .. } => operation,
        }
    }
}
