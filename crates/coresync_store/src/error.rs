//! Error types for the collection boundary.

use crate::collection::RowId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised at the local collection boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row id did not resolve to a stored row.
    #[error("row not found: {row_id}")]
    RowNotFound {
        /// The id that was looked up.
        row_id: RowId,
    },

    /// The host store failed an operation.
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a row not found error.
    pub fn row_not_found(row_id: RowId) -> Self {
        Self::RowNotFound { row_id }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
