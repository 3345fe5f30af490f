//! # Search Sync
//!
//! Keeps an external search index consistent with the local store of FRC
//! teams and events.
//!
//! ## Architecture
//!
//! The daemon follows a Store-Processor-Loader pattern:
//!
//! 1. **Store**: Commits validated changes and notifies subscribers
//! 2. **Processor**: Turns change sets into publish and retract operations
//! 3. **Loader**: Submits operations through the `IndexSyncService`
//! 4. **Resync**: Periodically republishes the whole store
//! 5. **Orchestrator**: Coordinates the flow and handles shutdown
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`store`]: Data store interface and the in-memory store
//! - [`processor`]: Change set processing
//! - [`loader`]: Submission of index operations
//! - [`resync`]: Full re-sync passes
//! - [`orchestrator`]: Coordinates the sync flow
//! - [`errors`]: Error types for the daemon

pub mod config;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod resync;
pub mod store;

pub use config::{AppConfig, Dependencies};
pub use errors::SyncError;

use thiserror::Error;

/// Errors that can occur during daemon initialization or execution.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Sync error.
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
