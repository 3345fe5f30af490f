//! Integration tests for the search sync orchestrator.
//!
//! These tests use the real Orchestrator and MemoryStore with a mock index
//! backend to ensure reliable testing.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::time::timeout;

use search_sync::errors::SyncError;
use search_sync::loader::IndexLoader;
use search_sync::orchestrator::{Orchestrator, OrchestratorConfig};
use search_sync::resync::ResyncScheduler;
use search_sync::store::{MemoryStore, Snapshot, Transaction};
use search_sync_repository::{IndexBackend, IndexError, IndexSyncService};
use search_sync_shared::{Event, EventRankingStat, IndexEntry, Team};

// Mock index backend for testing
struct MockIndexBackend {
    available: AtomicBool,
    indexed: Mutex<Vec<IndexEntry>>,
    deleted: Mutex<Vec<String>>,
    live: Mutex<BTreeSet<String>>,
}

impl MockIndexBackend {
    fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            indexed: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            live: Mutex::new(BTreeSet::new()),
        }
    }

    fn published_ids(&self) -> Vec<String> {
        self.indexed
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IndexBackend for MockIndexBackend {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn index_items(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        self.indexed.lock().unwrap().extend_from_slice(entries);
        self.live
            .lock()
            .unwrap()
            .extend(entries.iter().map(|entry| entry.id.clone()));
        Ok(())
    }

    async fn delete_items(&self, ids: &[String]) -> Result<(), IndexError> {
        self.deleted.lock().unwrap().extend_from_slice(ids);
        let mut live = self.live.lock().unwrap();
        for id in ids {
            live.remove(id);
        }
        Ok(())
    }

    async fn indexed_ids(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.live.lock().unwrap().iter().cloned().collect())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, IndexError> {
        Ok(0)
    }
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        channel_buffer_size: 32,
        resync_interval: Duration::from_secs(3600),
        progress_interval: Duration::from_secs(3600),
        resync_on_start: false,
    }
}

/// Helper to create a test orchestrator over a store with a mock backend
fn create_test_orchestrator(
    store: Arc<MemoryStore>,
    config: OrchestratorConfig,
) -> (Orchestrator, Arc<MockIndexBackend>) {
    let backend = Arc::new(MockIndexBackend::new());
    let orchestrator = orchestrator_over(store, backend.clone(), config);
    (orchestrator, backend)
}

/// Helper to create a test orchestrator writing to an existing backend
fn orchestrator_over(
    store: Arc<MemoryStore>,
    backend: Arc<MockIndexBackend>,
    config: OrchestratorConfig,
) -> Orchestrator {
    let service = Arc::new(IndexSyncService::new(backend));
    let changes = store.subscribe(config.channel_buffer_size);

    Orchestrator::with_config(
        store,
        changes,
        IndexLoader::new(service.clone()),
        ResyncScheduler::new(service),
        config,
    )
}

#[tokio::test]
async fn test_orchestrator_full_integration() {
    let store = Arc::new(MemoryStore::new());
    let (mut orchestrator, backend) = create_test_orchestrator(store.clone(), test_config());

    store
        .commit(
            Transaction::new()
                .upsert(Team::new(254, "The Cheesy Poofs"))
                .upsert(Event::new(2020, "casj", "Silicon Valley Regional")),
        )
        .await
        .unwrap();
    store.close().await;

    // Run the orchestrator with a timeout to avoid hanging
    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());

    let mut ids = backend.published_ids();
    ids.sort();
    assert_eq!(ids, vec!["2020casj".to_string(), "frc254".to_string()]);
}

#[tokio::test]
async fn test_orchestrator_with_deletes() {
    let store = Arc::new(MemoryStore::new());
    store
        .commit(
            Transaction::new()
                .upsert(Team::new(254, "The Cheesy Poofs"))
                .upsert(Team::new(604, "Quixilver")),
        )
        .await
        .unwrap();
    let (mut orchestrator, backend) = create_test_orchestrator(store.clone(), test_config());

    store
        .commit(Transaction::new().delete("frc254").delete("frc604"))
        .await
        .unwrap();
    store.close().await;

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.unwrap().is_ok());

    assert_eq!(
        backend.deleted_ids(),
        vec!["frc254".to_string(), "frc604".to_string()]
    );
    assert!(backend.published_ids().is_empty());
}

#[tokio::test]
async fn test_rejected_commit_never_reaches_the_index() {
    let store = Arc::new(MemoryStore::new());
    let (mut orchestrator, backend) = create_test_orchestrator(store.clone(), test_config());

    let mut conflicting = EventRankingStat::sort_order(1.0, "2020casj");
    conflicting.extra_stats_ranking = Some("2020casj".to_string());

    let result = store
        .commit(
            Transaction::new()
                .upsert(Team::new(254, "The Cheesy Poofs"))
                .ranking_stat(conflicting),
        )
        .await;
    assert!(matches!(result, Err(SyncError::ValidationError(_))));
    store.close().await;

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    assert!(backend.published_ids().is_empty());
    assert_eq!(orchestrator.stats().snapshot().change_sets, 0);
}

#[tokio::test]
async fn test_startup_resync_publishes_snapshot() {
    let snapshot = Snapshot {
        teams: (1..=7).map(|n| Team::new(n, format!("Team {}", n))).collect(),
        events: vec![],
        ranking_stats: vec![EventRankingStat::extra_stat(3.5, "2020casj")],
    };
    let store = Arc::new(MemoryStore::from_snapshot(snapshot, 3).unwrap());
    let config = OrchestratorConfig {
        resync_on_start: true,
        ..test_config()
    };
    let (mut orchestrator, backend) = create_test_orchestrator(store.clone(), config);

    store.close().await;
    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    let stats = orchestrator.stats().snapshot();
    assert_eq!(stats.resync_passes, 1);
    assert_eq!(stats.published, 7);
    assert_eq!(backend.published_ids().len(), 7);
}

#[tokio::test]
async fn test_unavailable_backend_heals_on_requested_resync() {
    let store = Arc::new(MemoryStore::new());
    let (mut orchestrator, backend) = create_test_orchestrator(store.clone(), test_config());
    backend.available.store(false, Ordering::SeqCst);

    store
        .commit(Transaction::new().upsert(Team::new(254, "The Cheesy Poofs")))
        .await
        .unwrap();

    let run = tokio::spawn(async move {
        let result = orchestrator.run().await;
        (orchestrator, result)
    });

    // Let the orchestrator drain the skipped publish before the backend returns.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(backend.published_ids().is_empty());

    backend.available.store(true, Ordering::SeqCst);
    store.request_resync().await;
    store.close().await;

    let (orchestrator, result) = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());

    let stats = orchestrator.stats().snapshot();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.resync_passes, 1);
    assert_eq!(backend.published_ids(), vec!["frc254".to_string()]);
}

#[tokio::test]
async fn test_restart_retracts_record_deleted_while_down() {
    let backend = Arc::new(MockIndexBackend::new());

    // First run indexes both teams.
    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = orchestrator_over(store.clone(), backend.clone(), test_config());
    store
        .commit(
            Transaction::new()
                .upsert(Team::new(254, "The Cheesy Poofs"))
                .upsert(Team::new(2, "Late Addition")),
        )
        .await
        .unwrap();
    store.close().await;
    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();
    drop(orchestrator);

    // frc2 is deleted while no daemon is running, then the daemon restarts.
    let snapshot = Snapshot {
        teams: vec![Team::new(254, "The Cheesy Poofs")],
        events: vec![],
        ranking_stats: vec![],
    };
    let store = Arc::new(MemoryStore::from_snapshot(snapshot, 10).unwrap());
    let config = OrchestratorConfig {
        resync_on_start: true,
        ..test_config()
    };
    let mut orchestrator = orchestrator_over(store.clone(), backend.clone(), config);
    store.close().await;
    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    let stats = orchestrator.stats().snapshot();
    assert_eq!(stats.resync_passes, 1);
    assert_eq!(backend.deleted_ids(), vec!["frc2".to_string()]);
    assert_eq!(
        backend.indexed_ids().await.unwrap(),
        vec!["frc254".to_string()]
    );
}

#[tokio::test]
async fn test_orchestrator_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let (mut orchestrator, _backend) = create_test_orchestrator(store.clone(), test_config());
    let shutdown = orchestrator.shutdown_handle();

    let run = tokio::spawn(async move { orchestrator.run().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown();

    let result = timeout(Duration::from_secs(5), run).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
    assert!(result.unwrap().unwrap().is_ok());
}
