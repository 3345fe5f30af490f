//! Index error types.
//!
//! This module defines the unified error type for index sync operations,
//! covering caller-visible failures (unavailable backend, invalid records)
//! as well as failures observed asynchronously from the backend.

use search_sync_shared::RelationError;
use thiserror::Error;

/// Unified errors from index sync operations.
///
/// Used by the `IndexBackend` trait, the `ErrorReporter` sink and
/// `IndexSyncService`. Only `BackendUnavailable` and `InvalidRecord` are ever
/// returned from `publish`; everything the backend reports after submission
/// reaches callers through the error reporter.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// The indexing facility is not present or not enabled.
    #[error("Index backend unavailable")]
    BackendUnavailable,

    /// The backend accepted a call and later reported a failure.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// A record violated a caller contract (empty key, conflicting relations).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Failed to establish a connection to the backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to create the backing index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to serialize data for the backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to parse a response from the backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// An entry was not present in the index.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl IndexError {
    /// Create a submission failure.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::SubmissionFailed(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an entry not found error.
    pub fn entry_not_found(id: impl Into<String>) -> Self {
        Self::EntryNotFound(id.into())
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether a delete that produced this error left the index in the requested state.
    pub fn is_benign_for_delete(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}

impl From<RelationError> for IndexError {
    fn from(err: RelationError) -> Self {
        Self::InvalidRecord(err.to_string())
    }
}
