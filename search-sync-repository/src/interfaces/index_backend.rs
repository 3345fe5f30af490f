//! Index backend trait definition.
//!
//! This module defines the abstract interface for the external search index,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_sync_shared::IndexEntry;

use crate::errors::IndexError;

/// Abstracts the underlying search index implementation.
///
/// Implementations are injected into `IndexSyncService` to enable dependency
/// injection and easy testing with mock implementations. Backends own their
/// batching and rate-limiting policy: the service hands over whole batches and
/// never chunks them.
///
/// # Note on Overwrites
///
/// There is no separate update operation. `index_items` replaces any entry
/// with the same id entirely; attributes from the previous entry are not
/// merged into the new one.
///
/// # Note on Expiry
///
/// Entries carry an optional `expires_at`. Nothing removes an expired entry
/// until `purge_expired` is called; the re-sync pass calls it once per run.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Capability probe: whether indexing is present and enabled.
    ///
    /// Must be cheap and must not fail; an unreachable backend is simply unavailable.
    async fn is_available(&self) -> bool;

    /// Insert or replace a batch of entries.
    ///
    /// # Arguments
    ///
    /// * `entries` - The entries to index, already de-duplicated by id
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the batch was applied
    /// * `Err(IndexError)` - If the backend rejected the batch
    async fn index_items(&self, entries: &[IndexEntry]) -> Result<(), IndexError>;

    /// Delete entries by id.
    ///
    /// Ids that are not present must not fail the call. Backends that can only
    /// report a missing id as an error return `IndexError::EntryNotFound`,
    /// which callers treat as success.
    ///
    /// # Arguments
    ///
    /// * `ids` - The entry ids to remove
    async fn delete_items(&self, ids: &[String]) -> Result<(), IndexError>;

    /// Ids of every entry currently held by the index, in any order.
    ///
    /// The re-sync pass compares this listing against the store to find
    /// entries whose record is gone.
    async fn indexed_ids(&self) -> Result<Vec<String>, IndexError>;

    /// Remove every entry whose `expires_at` is at or before `now`.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - The number of entries removed
    /// * `Err(IndexError)` - If the backend rejected the request
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IndexError>;
}
