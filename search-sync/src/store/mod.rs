//! Store module for the search sync daemon.
//!
//! Defines the data store interface the sync service reads from, the change
//! notifications it receives, and an in-memory store with pre-commit validation.

mod memory_store;
mod messages;

pub use memory_store::{CommitSummary, MemoryStore, Snapshot, Transaction};
pub use messages::{ChangeSet, Page, PageCursor, StoreMessage, StoredRecord};

use async_trait::async_trait;

use crate::errors::SyncError;

/// Paginated read access to the local dataset.
///
/// Pages are ordered by search key. Starting from `None` and following
/// `next_cursor` until it is `None` visits every record exactly once,
/// provided the store is not modified during the scan.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch the page following `cursor`, or the first page for `None`.
    async fn fetch_page(&self, cursor: Option<PageCursor>) -> Result<Page, SyncError>;
}
