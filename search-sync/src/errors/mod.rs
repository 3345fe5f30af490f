//! Error types for the search sync daemon.

use search_sync_repository::IndexError;
use search_sync_shared::RelationError;
use thiserror::Error;

/// Errors that can occur while syncing the store into the search index.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Error from the local data store.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Error loading a store snapshot.
    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    /// An entity failed validation before commit.
    #[error("Validation error: {0}")]
    ValidationError(#[from] RelationError),

    /// Error from the index sync service.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),
}

impl SyncError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    /// Create a snapshot error.
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::SnapshotError(msg.into())
    }

    /// Whether the error only means the index backend was unavailable.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::IndexError(IndexError::BackendUnavailable))
    }
}
