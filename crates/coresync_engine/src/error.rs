//! Error types for the sync engine.

use coresync_protocol::WireError;
use coresync_store::StoreError;
use coresync_value::ValueError;
use thiserror::Error;

/// Errors that can occur during pull, change detection or push.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Could not reach the remote store at all.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// Whether retrying the operation may succeed.
        retryable: bool,
    },

    /// The remote store failed on its side (HTTP 5xx and friends).
    #[error("remote error: {0}")]
    Remote(String),

    /// The remote store rejected a payload (HTTP 4xx).
    #[error("validation error: {0}")]
    Validation(String),

    /// A response could not be decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The local collection failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Value canonicalization failed.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The entity type is not registered.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// The entity type does not allow pulling.
    #[error("entity type does not support pull: {0}")]
    PullNotSupported(String),

    /// The entity type does not allow pushing.
    #[error("entity type does not support push: {0}")]
    PushNotSupported(String),

    /// A persisted snapshot could not be decoded.
    #[error("snapshot for '{entity}' is corrupt: {message}")]
    SnapshotCorrupt {
        /// Entity type whose snapshot failed to load.
        entity: String,
        /// Description of the decode failure.
        message: String,
    },
}

impl SyncError {
    /// Creates a transport error worth retrying.
    #[must_use]
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        SyncError::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a transport error that will not recover on its own.
    #[must_use]
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        SyncError::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a remote-side failure.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        SyncError::Remote(message.into())
    }

    /// Creates a payload rejection.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    /// Creates an unknown-entity error.
    #[must_use]
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        SyncError::UnknownEntityType(name.into())
    }

    /// Creates a corrupt-snapshot error.
    #[must_use]
    pub fn snapshot_corrupt(entity: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::SnapshotCorrupt {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Returns true if the operation may succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Remote(_) => true,
            _ => false,
        }
    }
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
