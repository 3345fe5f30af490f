//! Message types exchanged between the store and the sync service.

use chrono::{DateTime, Utc};
use search_sync_shared::{Record, SearchableRecord};

/// A record together with its last modification time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: Record,
    pub last_modified: DateTime<Utc>,
}

impl StoredRecord {
    pub fn key(&self) -> &str {
        self.record.search_key()
    }
}

/// Opaque position in a paginated scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub(crate) String);

impl PageCursor {
    /// Cursor positioned after the record with `key`.
    pub fn after(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a scan.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<StoredRecord>,
    /// `None` when this is the last page.
    pub next_cursor: Option<PageCursor>,
}

/// Records changed by a single store commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub inserted: Vec<Record>,
    pub updated: Vec<Record>,
    /// Keys of deleted records.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of changed records.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

/// Messages that flow from the store to the orchestrator.
#[derive(Debug)]
pub enum StoreMessage {
    /// Records changed.
    Changes(ChangeSet),
    /// The host asked for a full re-sync outside the regular schedule.
    ResyncRequested,
    /// The store is shutting down.
    End,
}
