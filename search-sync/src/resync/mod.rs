//! Periodic full re-sync.
//!
//! Change notifications can be lost and index entries expire, so the daemon
//! regularly walks the whole store and publishes every record again. Each page
//! becomes one publish batch. After the walk, expired entries are purged and
//! the backend's id listing is compared with the keys seen in the store.

use std::collections::HashSet;
use std::sync::Arc;

use search_sync_repository::{IndexSyncService, SubmissionHandle};
use search_sync_shared::{Record, SearchableRecord};
use tracing::{debug, info, instrument, warn};

use crate::errors::SyncError;
use crate::store::{DataStore, PageCursor};

/// Configuration for the re-sync scheduler.
#[derive(Debug, Clone)]
pub struct ResyncConfig {
    /// Retract indexed entries whose record is no longer in the store.
    pub retract_missing: bool,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            retract_missing: true,
        }
    }
}

/// Result of a completed re-sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub pages: usize,
    pub published: usize,
    pub retracted: usize,
    pub purged: usize,
}

/// Walks the store page by page and republishes everything.
pub struct ResyncScheduler {
    service: Arc<IndexSyncService>,
    config: ResyncConfig,
}

impl ResyncScheduler {
    pub fn new(service: Arc<IndexSyncService>) -> Self {
        Self::with_config(service, ResyncConfig::default())
    }

    pub fn with_config(service: Arc<IndexSyncService>, config: ResyncConfig) -> Self {
        Self { service, config }
    }

    /// Run one full pass over `store`.
    ///
    /// An unavailable backend aborts the pass with `BackendUnavailable`.
    /// Failures of the purge or of the id listing are logged and only skip
    /// that step; the next pass tries again.
    #[instrument(skip(self, store))]
    pub async fn run_pass(&mut self, store: &dyn DataStore) -> Result<ResyncReport, SyncError> {
        let mut report = ResyncReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut handles: Vec<SubmissionHandle> = Vec::new();
        let mut cursor: Option<PageCursor> = None;

        loop {
            let page = store.fetch_page(cursor.clone()).await?;
            report.pages += 1;

            let records: Vec<Record> = page.records.into_iter().map(|stored| stored.record).collect();
            seen.extend(records.iter().map(|record| record.search_key().to_string()));

            let handle = self.service.publish(&records).await?;
            report.published += handle.entry_count();
            handles.push(handle);

            match page.next_cursor {
                Some(next) if cursor.as_ref() == Some(&next) => {
                    return Err(SyncError::store(format!(
                        "cursor did not advance past {}",
                        next.as_str()
                    )));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        for handle in handles {
            handle.wait().await;
        }

        match self.service.purge_expired().await {
            Ok(purged) => report.purged = purged,
            Err(e) => warn!(error = %e, "Expiry purge failed"),
        }

        if self.config.retract_missing {
            report.retracted = self.retract_missing(&seen).await;
        }

        info!(
            pages = report.pages,
            published = report.published,
            retracted = report.retracted,
            purged = report.purged,
            "Re-sync pass complete"
        );
        Ok(report)
    }

    /// Retract every indexed id that is not among the store's keys.
    ///
    /// Returns the number of ids submitted for retraction.
    async fn retract_missing(&self, seen: &HashSet<String>) -> usize {
        let indexed = match self.service.indexed_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not list indexed ids, skipping retraction");
                return 0;
            }
        };

        let missing: Vec<String> = indexed
            .into_iter()
            .filter(|id| !seen.contains(id))
            .collect();
        if missing.is_empty() {
            return 0;
        }

        debug!(count = missing.len(), "Retracting entries with no record in the store");
        let handle = self.service.retract_many(missing);
        let retracted = handle.entry_count();
        handle.wait().await;
        retracted
    }

    /// Run a pass, logging instead of returning an unavailable backend.
    pub async fn run_pass_logged(
        &mut self,
        store: &dyn DataStore,
    ) -> Result<Option<ResyncReport>, SyncError> {
        match self.run_pass(store).await {
            Ok(report) => Ok(Some(report)),
            Err(e) if e.is_backend_unavailable() => {
                warn!("Index backend unavailable, re-sync pass skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
