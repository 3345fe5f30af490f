//! Index sync service implementation.
//!
//! This module provides the main service that keeps the search index in step
//! with the local store. Application code uses it to publish changed records
//! and retract deleted ones.
//!
//! # Note on Delivery
//!
//! Both operations are fire-and-forget. `publish` reports success once the
//! backend call has been submitted, not once it has been applied. Failures the
//! backend reports later reach the `ErrorReporter` and are otherwise dropped:
//! there is no retry queue, so a failing backend drifts out of sync until the
//! next full re-sync pass publishes every record again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use search_sync_shared::{ExclusiveRelations, IndexEntry, RelationError, SearchableRecord};
use tracing::{debug, error, instrument, warn};

use crate::config::IndexSyncConfig;
use crate::errors::IndexError;
use crate::interfaces::{ErrorReporter, IndexBackend, TracingErrorReporter};
use crate::types::{SubmissionHandle, SubmissionKind};
use crate::utils::{dedupe_last_wins, validate_search_key};

/// The main service for keeping the search index in sync.
///
/// This is the high-level API that the data layer should use. It validates
/// records, derives index entries from them and hands batches to an
/// `IndexBackend`. The service holds no mutable state and performs no locking;
/// concurrent calls are allowed and the backend serializes them.
///
/// Calls that spawn backend work (`publish`, `retract`, `retract_many`) must be
/// made from within a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use search_sync_repository::{InMemoryIndexBackend, IndexSyncService};
/// use search_sync_shared::Team;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(InMemoryIndexBackend::new());
/// let service = IndexSyncService::new(backend);
///
/// let handle = service.publish(&[Team::new(254, "The Cheesy Poofs")]).await?;
/// handle.wait().await;
///
/// service.retract("frc254").wait().await;
/// # Ok(())
/// # }
/// ```
pub struct IndexSyncService {
    backend: Arc<dyn IndexBackend>,
    reporter: Arc<dyn ErrorReporter>,
    config: IndexSyncConfig,
}

impl IndexSyncService {
    /// Create a new IndexSyncService that reports failures through `tracing`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The index backend (e.g., `OpenSearchBackend`)
    pub fn new(backend: Arc<dyn IndexBackend>) -> Self {
        Self::with_config(
            backend,
            Arc::new(TracingErrorReporter),
            IndexSyncConfig::default(),
        )
    }

    /// Create a new IndexSyncService with a custom error reporter.
    pub fn with_reporter(backend: Arc<dyn IndexBackend>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self::with_config(backend, reporter, IndexSyncConfig::default())
    }

    /// Create a new IndexSyncService with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `backend` - The index backend
    /// * `reporter` - Sink for failures observed after submission
    /// * `config` - Custom configuration for the service
    pub fn with_config(
        backend: Arc<dyn IndexBackend>,
        reporter: Arc<dyn ErrorReporter>,
        config: IndexSyncConfig,
    ) -> Self {
        Self {
            backend,
            reporter,
            config,
        }
    }

    pub fn config(&self) -> &IndexSyncConfig {
        &self.config
    }

    /// End of the freshness window for entries built now.
    ///
    /// A TTL reaching past the representable range is clamped to
    /// `DateTime::<Utc>::MAX_UTC`.
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = self.config.entry_ttl?;
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        match expires_at {
            Some(expires_at) => Some(expires_at),
            None => {
                warn!(ttl_secs = ttl.as_secs(), "Entry TTL out of range, clamping expiry");
                Some(DateTime::<Utc>::MAX_UTC)
            }
        }
    }

    /// Build the de-duplicated entry batch for a set of records.
    ///
    /// Duplicate keys resolve last-wins: the last record with a given key
    /// provides the entry, positioned where the key first appeared.
    ///
    /// # Returns
    ///
    /// * `Ok((entries, dropped))` - Entries to submit and the number of duplicates dropped
    /// * `Err(IndexError::InvalidRecord)` - If any record has an empty search key
    pub fn build_entries<R>(&self, records: &[R]) -> Result<(Vec<IndexEntry>, usize), IndexError>
    where
        R: SearchableRecord,
    {
        for record in records {
            validate_search_key(record.search_key())?;
        }

        let expires_at = self.expires_at();
        let entries = records
            .iter()
            .map(|record| IndexEntry::from_record(record, expires_at))
            .collect();
        Ok(dedupe_last_wins(entries))
    }

    /// Publish records to the search index.
    ///
    /// Probes the backend first and returns without side effects when indexing
    /// is unavailable. Otherwise builds one entry per record and submits the
    /// whole batch in a single background call.
    ///
    /// # Arguments
    ///
    /// * `records` - The records to index; may be empty
    ///
    /// # Returns
    ///
    /// * `Ok(SubmissionHandle)` - The batch was submitted (or was empty)
    /// * `Err(IndexError::InvalidRecord)` - If a record has an empty search key; nothing is submitted
    /// * `Err(IndexError::BackendUnavailable)` - If the capability probe failed; nothing is submitted
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    pub async fn publish<R>(&self, records: &[R]) -> Result<SubmissionHandle, IndexError>
    where
        R: SearchableRecord + Sync,
    {
        if records.is_empty() {
            return Ok(SubmissionHandle::noop());
        }

        for record in records {
            if let Err(e) = validate_search_key(record.search_key()) {
                error!(error = %e, "Refusing to publish batch containing an invalid record");
                return Err(e);
            }
        }

        if !self.backend.is_available().await {
            warn!("Index backend unavailable, skipping publish");
            return Err(IndexError::BackendUnavailable);
        }

        let (entries, dropped) = self.build_entries(records)?;
        if dropped > 0 {
            debug!(
                dropped = dropped,
                "Collapsed duplicate search keys, last record wins"
            );
        }

        let entry_count = entries.len();
        let backend = Arc::clone(&self.backend);
        let reporter = Arc::clone(&self.reporter);

        let task = tokio::spawn(async move {
            match backend.index_items(&entries).await {
                Ok(()) => debug!(count = entry_count, "Index batch applied"),
                Err(e) => reporter.report(&into_submission_error(e)),
            }
        });

        debug!(count = entry_count, "Index batch submitted");
        Ok(SubmissionHandle::spawned(
            SubmissionKind::Index,
            entry_count,
            task,
        ))
    }

    /// Remove a single entry from the search index.
    ///
    /// Retracting a key that is not indexed is a no-op for the caller.
    pub fn retract(&self, key: &str) -> SubmissionHandle {
        self.retract_many(vec![key.to_string()])
    }

    /// Remove several entries in one backend call.
    ///
    /// Empty keys are skipped with a warning; an empty list submits nothing.
    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    pub fn retract_many(&self, keys: Vec<String>) -> SubmissionHandle {
        let ids: Vec<String> = keys
            .into_iter()
            .filter(|key| {
                let valid = validate_search_key(key).is_ok();
                if !valid {
                    warn!("Skipping retract of empty search key");
                }
                valid
            })
            .collect();

        if ids.is_empty() {
            return SubmissionHandle::noop();
        }

        let id_count = ids.len();
        let backend = Arc::clone(&self.backend);
        let reporter = Arc::clone(&self.reporter);

        let task = tokio::spawn(async move {
            match backend.delete_items(&ids).await {
                Ok(()) => debug!(count = id_count, "Delete batch applied"),
                Err(e) if e.is_benign_for_delete() => {
                    debug!(error = %e, "Delete targeted entries that were not indexed");
                }
                Err(e) => reporter.report(&into_submission_error(e)),
            }
        });

        SubmissionHandle::spawned(SubmissionKind::Delete, id_count, task)
    }

    /// Ids of every entry the backend currently holds.
    pub async fn indexed_ids(&self) -> Result<Vec<String>, IndexError> {
        self.backend.indexed_ids().await
    }

    /// Remove entries whose freshness window has already elapsed.
    ///
    /// Unlike `publish` and `retract`, this waits for the backend.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<usize, IndexError> {
        self.backend.purge_expired(Utc::now()).await
    }

    /// Whether an entity with exclusive relations has none of them set.
    ///
    /// Orphaned entities should be cleaned up by the data layer.
    pub fn is_orphaned<E: ExclusiveRelations + ?Sized>(entity: &E) -> bool {
        entity.is_orphaned()
    }

    /// Validate an entity immediately before it is committed.
    pub fn validate_for_commit<E: ExclusiveRelations + ?Sized>(
        entity: &E,
    ) -> Result<(), RelationError> {
        entity.validate_relations()
    }
}

fn into_submission_error(err: IndexError) -> IndexError {
    match err {
        IndexError::SubmissionFailed(_) => err,
        other => IndexError::submission(other.to_string()),
    }
}
