//! Loader module for the search sync daemon.
//!
//! Hands processed operations to the `IndexSyncService` and keeps track of the
//! submissions still running in the background.

use std::sync::Arc;

use search_sync_repository::{IndexError, IndexSyncService, SubmissionHandle};
use tracing::{debug, error, instrument, warn};

use crate::errors::SyncError;
use crate::processor::SyncOperation;

/// Counts of what a single `load` call submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Entries handed to the backend for indexing.
    pub published: usize,
    /// Keys handed to the backend for deletion.
    pub retracted: usize,
    /// Publish batches skipped because the backend was unavailable.
    pub skipped: usize,
}

/// Loader that submits index operations.
///
/// Submissions are fire-and-forget; the loader only keeps their handles so
/// `flush` can wait for them during shutdown.
pub struct IndexLoader {
    service: Arc<IndexSyncService>,
    in_flight: Vec<SubmissionHandle>,
}

impl IndexLoader {
    /// Create a new loader over the given service.
    pub fn new(service: Arc<IndexSyncService>) -> Self {
        Self {
            service,
            in_flight: Vec::new(),
        }
    }

    pub fn service(&self) -> &Arc<IndexSyncService> {
        &self.service
    }

    /// Submit a list of operations.
    ///
    /// An unavailable backend skips the publish with a warning; the records
    /// are picked up by the next re-sync pass. A record with an empty key
    /// fails the call.
    #[instrument(skip(self, operations), fields(operation_count = operations.len()))]
    pub async fn load(&mut self, operations: Vec<SyncOperation>) -> Result<LoadSummary, SyncError> {
        self.in_flight.retain(|handle| !handle.is_finished());

        let mut summary = LoadSummary::default();
        for operation in operations {
            match operation {
                SyncOperation::Publish(records) => match self.service.publish(&records).await {
                    Ok(handle) => {
                        summary.published += handle.entry_count();
                        self.track(handle);
                    }
                    Err(IndexError::BackendUnavailable) => {
                        warn!(
                            record_count = records.len(),
                            "Index backend unavailable, publish deferred to next re-sync"
                        );
                        summary.skipped += 1;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to publish records");
                        return Err(e.into());
                    }
                },
                SyncOperation::Retract(keys) => {
                    let handle = self.service.retract_many(keys);
                    summary.retracted += handle.entry_count();
                    self.track(handle);
                }
            }
        }

        debug!(?summary, in_flight = self.in_flight.len(), "Operations loaded");
        Ok(summary)
    }

    fn track(&mut self, handle: SubmissionHandle) {
        if handle.is_submitted() {
            self.in_flight.push(handle);
        }
    }

    /// Number of submissions that may still be running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every tracked submission to finish.
    #[instrument(skip(self))]
    pub async fn flush(&mut self) {
        let pending: Vec<SubmissionHandle> = self.in_flight.drain(..).collect();
        if pending.is_empty() {
            return;
        }

        debug!(count = pending.len(), "Waiting for in-flight submissions");
        for handle in pending {
            handle.wait().await;
        }
    }
}
