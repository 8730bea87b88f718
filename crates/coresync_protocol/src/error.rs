//! Error types for wire decoding.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised while decoding remote store payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The payload was not valid JSON.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Parser message.
        message: String,
    },

    /// The payload parsed but did not have the expected shape.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the mismatch.
        message: String,
    },
}

impl WireError {
    /// Creates an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}
