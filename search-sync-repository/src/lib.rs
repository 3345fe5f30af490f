//! # Search Sync Repository
//!
//! This crate provides the traits and implementations that keep an external
//! search index consistent with the local store. It includes the error type,
//! the backend and error-reporter interfaces, the `IndexSyncService` that
//! publishes and retracts records, and in-memory and OpenSearch backends.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod service;
pub mod types;
pub mod utils;

pub use config::IndexSyncConfig;
pub use errors::IndexError;
pub use interfaces::{ErrorReporter, IndexBackend, TracingErrorReporter};
pub use memory::InMemoryIndexBackend;
pub use opensearch::OpenSearchBackend;
pub use service::IndexSyncService;
pub use types::{SubmissionHandle, SubmissionKind};
