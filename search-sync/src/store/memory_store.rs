//! In-memory data store with pre-commit validation.
//!
//! Every commit runs the exclusive-relation validator on staged ranking stats
//! before anything is applied. A conflicting entity rejects the whole commit;
//! orphaned entities are pruned instead of persisted. Successful commits are
//! broadcast to subscribers as `ChangeSet`s.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use search_sync_repository::IndexSyncService;
use search_sync_shared::{Event, EventRankingStat, Record, SearchableRecord, Team};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::SyncError;
use crate::store::messages::{ChangeSet, Page, PageCursor, StoreMessage, StoredRecord};
use crate::store::DataStore;

/// Default number of records per page.
const DEFAULT_PAGE_SIZE: usize = 500;

/// Serialized form used to seed a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub ranking_stats: Vec<EventRankingStat>,
}

/// A batch of staged changes applied atomically by [`MemoryStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    upserts: Vec<Record>,
    deletes: Vec<String>,
    ranking_stats: Vec<EventRankingStat>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn upsert(mut self, record: impl Into<Record>) -> Self {
        self.upserts.push(record.into());
        self
    }

    /// Delete a record by key.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.deletes.push(key.into());
        self
    }

    /// Insert or replace a ranking stat.
    pub fn ranking_stat(mut self, stat: EventRankingStat) -> Self {
        self.ranking_stats.push(stat);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty() && self.ranking_stats.is_empty()
    }
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub stats_saved: usize,
    /// Orphaned ranking stats dropped instead of saved.
    pub stats_pruned: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, StoredRecord>,
    ranking_stats: HashMap<Uuid, EventRankingStat>,
}

/// Process-local store of teams, events and ranking stats.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    subscribers: Mutex<Vec<mpsc::Sender<StoreMessage>>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store returning at most `page_size` records per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            subscribers: Mutex::new(Vec::new()),
            page_size: page_size.max(1),
        }
    }

    /// Create a store seeded from a JSON snapshot file.
    ///
    /// The snapshot goes through the same validation as a commit.
    pub fn from_snapshot_file(path: impl AsRef<Path>, page_size: usize) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::snapshot(format!("{}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)
            .map_err(|e| SyncError::snapshot(format!("{}: {}", path.display(), e)))?;
        Self::from_snapshot(snapshot, page_size)
    }

    /// Create a store seeded from an in-memory snapshot.
    pub fn from_snapshot(snapshot: Snapshot, page_size: usize) -> Result<Self, SyncError> {
        let store = Self::with_page_size(page_size);
        let mut transaction = Transaction::new();
        for team in snapshot.teams {
            transaction = transaction.upsert(team);
        }
        for event in snapshot.events {
            transaction = transaction.upsert(event);
        }
        for stat in snapshot.ranking_stats {
            transaction = transaction.ranking_stat(stat);
        }

        let (summary, _) = store.apply(transaction)?;
        info!(
            records = summary.inserted,
            ranking_stats = summary.stats_saved,
            pruned = summary.stats_pruned,
            "Store seeded from snapshot"
        );
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::Sender<StoreMessage>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register for change notifications.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Capacity of the notification channel
    pub fn subscribe(&self, buffer: usize) -> mpsc::Receiver<StoreMessage> {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        self.subscribers().push(sender);
        receiver
    }

    /// Ask subscribers to run a full re-sync now.
    pub async fn request_resync(&self) {
        self.broadcast(|| StoreMessage::ResyncRequested).await;
    }

    /// Tell subscribers the store is going away.
    pub async fn close(&self) {
        self.broadcast(|| StoreMessage::End).await;
        self.subscribers().clear();
    }

    async fn broadcast<F>(&self, message: F)
    where
        F: Fn() -> StoreMessage,
    {
        let senders: Vec<mpsc::Sender<StoreMessage>> = self.subscribers().clone();
        for sender in &senders {
            if sender.send(message()).await.is_err() {
                debug!("Dropping closed store subscriber");
            }
        }
        self.subscribers().retain(|sender| !sender.is_closed());
    }

    /// Validate and apply a transaction, then notify subscribers.
    ///
    /// # Returns
    ///
    /// * `Ok(CommitSummary)` - The transaction was applied
    /// * `Err(SyncError::ValidationError)` - A staged entity has conflicting relations; nothing was applied
    /// * `Err(SyncError::StoreError)` - A staged record has an empty key; nothing was applied
    #[instrument(skip(self, transaction))]
    pub async fn commit(&self, transaction: Transaction) -> Result<CommitSummary, SyncError> {
        let (summary, changes) = self.apply(transaction)?;
        if !changes.is_empty() {
            self.broadcast(move || StoreMessage::Changes(changes.clone()))
                .await;
        }
        Ok(summary)
    }

    /// Pre-commit hook: reject the transaction if any staged entity is invalid.
    fn validate(transaction: &Transaction) -> Result<(), SyncError> {
        for record in &transaction.upserts {
            if record.search_key().trim().is_empty() {
                return Err(SyncError::store("record key must not be empty"));
            }
        }
        for stat in &transaction.ranking_stats {
            IndexSyncService::validate_for_commit(stat)?;
        }
        Ok(())
    }

    fn apply(&self, transaction: Transaction) -> Result<(CommitSummary, ChangeSet), SyncError> {
        Self::validate(&transaction)?;

        let now = Utc::now();
        let mut summary = CommitSummary::default();
        let mut changes = ChangeSet::default();
        let mut state = self.write();

        for record in transaction.upserts {
            let key = record.search_key().to_string();
            let stored = StoredRecord {
                record: record.clone(),
                last_modified: now,
            };
            if state.records.insert(key, stored).is_some() {
                summary.updated += 1;
                changes.updated.push(record);
            } else {
                summary.inserted += 1;
                changes.inserted.push(record);
            }
        }

        for key in transaction.deletes {
            if state.records.remove(&key).is_some() {
                summary.deleted += 1;
                changes.deleted.push(key);
            }
        }

        for stat in transaction.ranking_stats {
            if IndexSyncService::is_orphaned(&stat) {
                warn!(stat_id = %stat.id, "Pruning orphaned ranking stat");
                state.ranking_stats.remove(&stat.id);
                summary.stats_pruned += 1;
            } else {
                state.ranking_stats.insert(stat.id, stat);
                summary.stats_saved += 1;
            }
        }

        debug!(?summary, "Transaction applied");
        Ok((summary, changes))
    }

    /// Look up a record by key.
    pub fn get(&self, key: &str) -> Option<StoredRecord> {
        self.read().records.get(key).cloned()
    }

    /// Look up a ranking stat by id.
    pub fn ranking_stat(&self, id: &Uuid) -> Option<EventRankingStat> {
        self.read().ranking_stats.get(id).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn fetch_page(&self, cursor: Option<PageCursor>) -> Result<Page, SyncError> {
        let state = self.read();
        let lower = match &cursor {
            Some(cursor) => Bound::Excluded(cursor.as_str().to_string()),
            None => Bound::Unbounded,
        };

        let mut range = state.records.range((lower, Bound::Unbounded));
        let records: Vec<StoredRecord> = range
            .by_ref()
            .take(self.page_size)
            .map(|(_, stored)| stored.clone())
            .collect();

        let next_cursor = match (range.next(), records.last()) {
            (Some(_), Some(last)) => Some(PageCursor::after(last.key())),
            _ => None,
        };

        Ok(Page {
            records,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(page_size: usize) -> MemoryStore {
        let snapshot = Snapshot {
            teams: vec![
                Team::new(254, "The Cheesy Poofs"),
                Team::new(604, "Quixilver"),
                Team::new(1678, "Citrus Circuits"),
            ],
            events: vec![Event::new(2020, "casj", "Silicon Valley Regional")],
            ranking_stats: vec![],
        };
        MemoryStore::from_snapshot(snapshot, page_size).unwrap()
    }

    #[tokio::test]
    async fn test_pagination_visits_every_record_once() {
        let store = seeded(2);

        let first = store.fetch_page(None).await.unwrap();
        assert_eq!(first.records.len(), 2);
        let cursor = first.next_cursor.clone().expect("more pages");

        let second = store.fetch_page(Some(cursor)).await.unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(second.next_cursor.is_none());

        let keys: Vec<&str> = first
            .records
            .iter()
            .chain(second.records.iter())
            .map(StoredRecord::key)
            .collect();
        assert_eq!(keys, vec!["2020casj", "frc1678", "frc254", "frc604"]);
    }

    #[tokio::test]
    async fn test_empty_store_single_empty_page() {
        let store = MemoryStore::new();
        let page = store.fetch_page(None).await.unwrap();

        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_commit_notifies_subscribers() {
        let store = seeded(10);
        let mut receiver = store.subscribe(8);

        let summary = store
            .commit(
                Transaction::new()
                    .upsert(Team::new(118, "Robonauts"))
                    .upsert(Team::new(254, "Cheesy Poofs"))
                    .delete("frc604")
                    .delete("frc9999"),
            )
            .await
            .unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.deleted, 1);

        match receiver.recv().await {
            Some(StoreMessage::Changes(changes)) => {
                assert_eq!(changes.inserted.len(), 1);
                assert_eq!(changes.updated.len(), 1);
                assert_eq!(changes.deleted, vec!["frc604".to_string()]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conflicting_ranking_stat_rejects_whole_commit() {
        let store = seeded(10);
        let mut receiver = store.subscribe(8);

        let mut conflicting = EventRankingStat::sort_order(1.0, "2020casj");
        conflicting.extra_stats_ranking = Some("2020casj".to_string());

        let result = store
            .commit(
                Transaction::new()
                    .upsert(Team::new(118, "Robonauts"))
                    .ranking_stat(conflicting.clone()),
            )
            .await;

        assert!(matches!(result, Err(SyncError::ValidationError(_))));
        assert!(store.get("frc118").is_none());
        assert!(store.ranking_stat(&conflicting.id).is_none());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_orphaned_ranking_stat_is_pruned() {
        let store = MemoryStore::new();
        let mut stat = EventRankingStat::extra_stat(9.5, "2020casj");

        store
            .commit(Transaction::new().ranking_stat(stat.clone()))
            .await
            .unwrap();
        assert!(store.ranking_stat(&stat.id).is_some());

        stat.extra_stats_ranking = None;
        let summary = store
            .commit(Transaction::new().ranking_stat(stat.clone()))
            .await
            .unwrap();

        assert_eq!(summary.stats_pruned, 1);
        assert!(store.ranking_stat(&stat.id).is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        let mut team = Team::new(1, "One");
        team.key = String::new();

        let result = store.commit(Transaction::new().upsert(team)).await;

        assert!(matches!(result, Err(SyncError::StoreError(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_request_resync_and_close() {
        let store = MemoryStore::new();
        let mut receiver = store.subscribe(4);

        store.request_resync().await;
        store.close().await;

        assert!(matches!(
            receiver.recv().await,
            Some(StoreMessage::ResyncRequested)
        ));
        assert!(matches!(receiver.recv().await, Some(StoreMessage::End)));
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_snapshot_deserialization() {
        let json = r#"{
            "teams": [{ "key": "frc254", "team_number": 254, "nickname": "The Cheesy Poofs" }],
            "events": [{ "key": "2020casj", "name": "Silicon Valley Regional", "event_code": "casj", "year": 2020 }]
        }"#;

        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let store = MemoryStore::from_snapshot(snapshot, 10).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get("frc254").is_some());
    }
}
