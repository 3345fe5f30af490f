//! In-memory backend implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search_sync_shared::{AttributeValue, IndexEntry};
use tracing::debug;

use crate::errors::IndexError;
use crate::interfaces::IndexBackend;

/// Process-local search index.
///
/// Entries past their `expires_at` are invisible to reads and are removed by
/// `purge_expired`. Availability and failure can be
/// toggled at runtime to simulate a disabled or misbehaving index.
#[derive(Debug)]
pub struct InMemoryIndexBackend {
    entries: Mutex<HashMap<String, IndexEntry>>,
    available: AtomicBool,
    failing: AtomicBool,
    index_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl Default for InMemoryIndexBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIndexBackend {
    /// Create an empty, available backend.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            index_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, IndexEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent per entry.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Toggle the capability probe result.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every subsequent index or delete call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `index_items` calls received.
    pub fn index_call_count(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_items` calls received.
    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Look up a live entry.
    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.get_at(id, Utc::now())
    }

    /// Look up an entry as seen at `now`.
    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<IndexEntry> {
        self.lock()
            .get(id)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned()
    }

    /// Ids of all live entries, sorted.
    pub fn ids(&self) -> Vec<String> {
        let now = Utc::now();
        let mut ids: Vec<String> = self
            .lock()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive substring search over text and keyword attributes.
    ///
    /// Results are sorted by id.
    pub fn search(&self, query: &str) -> Vec<IndexEntry> {
        let needle = query.to_lowercase();
        let now = Utc::now();
        let mut hits: Vec<IndexEntry> = self
            .lock()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .filter(|entry| entry.attributes.values().any(|value| value_matches(value, &needle)))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }
}

fn value_matches(value: &AttributeValue, needle: &str) -> bool {
    match value {
        AttributeValue::Text(text) => text.to_lowercase().contains(needle),
        AttributeValue::List(items) => items
            .iter()
            .any(|item| item.to_lowercase().contains(needle)),
        _ => false,
    }
}

#[async_trait]
impl IndexBackend for InMemoryIndexBackend {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn index_items(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::submission("in-memory backend set to fail"));
        }

        let mut map = self.lock();
        for entry in entries {
            map.insert(entry.id.clone(), entry.clone());
        }
        debug!(count = entries.len(), "Indexed entries in memory");
        Ok(())
    }

    async fn delete_items(&self, ids: &[String]) -> Result<(), IndexError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::submission("in-memory backend set to fail"));
        }

        let mut map = self.lock();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn indexed_ids(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.ids())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IndexError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged = purged, "Purged expired entries");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use search_sync_shared::{Event, Team};

    #[tokio::test]
    async fn test_index_overwrites_entire_entry() {
        let backend = InMemoryIndexBackend::new();
        let mut team = Team::new(254, "The Cheesy Poofs");
        team.city = Some("San Jose".to_string());

        backend
            .index_items(&[IndexEntry::from_record(&team, None)])
            .await
            .unwrap();
        assert!(backend.get("frc254").unwrap().attributes.contains_key("location"));

        team.city = None;
        backend
            .index_items(&[IndexEntry::from_record(&team, None)])
            .await
            .unwrap();

        let entry = backend.get("frc254").unwrap();
        assert!(!entry.attributes.contains_key("location"));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let backend = InMemoryIndexBackend::new();

        backend.delete_items(&["frc1".to_string()]).await.unwrap();
        backend.delete_items(&["frc1".to_string()]).await.unwrap();

        assert_eq!(backend.delete_call_count(), 2);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_are_hidden_and_purged() {
        let backend = InMemoryIndexBackend::new();
        let now = Utc::now();
        let entry = IndexEntry::from_record(&Team::new(118, "Robonauts"), Some(now + Duration::days(30)));
        backend.index_items(&[entry]).await.unwrap();

        assert!(backend.get_at("frc118", now + Duration::days(29)).is_some());
        assert!(backend.get_at("frc118", now + Duration::days(31)).is_none());

        assert_eq!(backend.purge_expired(now + Duration::days(1)).await.unwrap(), 0);
        assert_eq!(backend.purge_expired(now + Duration::days(31)).await.unwrap(), 1);
        assert!(backend.get("frc118").is_none());
    }

    #[tokio::test]
    async fn test_indexed_ids_lists_live_entries() {
        let backend = InMemoryIndexBackend::new();
        let expired = Utc::now() - Duration::seconds(1);
        backend
            .index_items(&[
                IndexEntry::from_record(&Team::new(604, "Quixilver"), None),
                IndexEntry::from_record(&Team::new(254, "The Cheesy Poofs"), None),
                IndexEntry::from_record(&Team::new(118, "Robonauts"), Some(expired)),
            ])
            .await
            .unwrap();

        assert_eq!(
            backend.indexed_ids().await.unwrap(),
            vec!["frc254".to_string(), "frc604".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failure_and_availability_toggles() {
        let backend = InMemoryIndexBackend::new();
        assert!(backend.is_available().await);

        backend.set_available(false);
        assert!(!backend.is_available().await);

        backend.set_failing(true);
        let result = backend
            .index_items(&[IndexEntry::from_record(&Team::new(1, "One"), None)])
            .await;
        assert!(matches!(result, Err(IndexError::SubmissionFailed(_))));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_search() {
        let backend = InMemoryIndexBackend::new();
        backend
            .index_items(&[
                IndexEntry::from_record(&Team::new(254, "The Cheesy Poofs"), None),
                IndexEntry::from_record(&Event::new(2020, "casj", "Silicon Valley Regional"), None),
            ])
            .await
            .unwrap();

        let hits = backend.search("cheesy");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "frc254");

        let hits = backend.search("CASJ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2020casj");
    }
}
