//! Error types for the value crate.

use thiserror::Error;

/// Result type for value operations.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur while serializing values.
///
/// Canonicalization itself never fails; it degrades to the original
/// literal on any parse ambiguity. Errors only arise when a canonical
/// form cannot be rendered to bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Failed to render a canonical byte representation.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },
}

impl ValueError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }
}
