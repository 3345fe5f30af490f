//! Orchestrator module for the search sync daemon.
//!
//! Coordinates the store notifications, processor, loader and re-sync
//! scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::SyncError;
use crate::loader::IndexLoader;
use crate::processor::ChangeProcessor;
use crate::resync::ResyncScheduler;
use crate::store::{ChangeSet, DataStore, StoreMessage};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the store notification channel buffer.
    pub channel_buffer_size: usize,
    /// Time between full re-sync passes. Must be shorter than the entry TTL.
    pub resync_interval: Duration,
    /// Time between progress log lines.
    pub progress_interval: Duration,
    /// Run a re-sync pass before handling the first notification.
    pub resync_on_start: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            resync_interval: Duration::from_secs(24 * 60 * 60),
            progress_interval: Duration::from_secs(10),
            resync_on_start: true,
        }
    }
}

/// Counters shared between the orchestrator and observers.
#[derive(Debug, Default)]
pub struct SyncStats {
    change_sets: AtomicU64,
    published: AtomicU64,
    retracted: AtomicU64,
    skipped: AtomicU64,
    resync_passes: AtomicU64,
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub change_sets: u64,
    pub published: u64,
    pub retracted: u64,
    /// Publish batches skipped because the backend was unavailable.
    pub skipped: u64,
    pub resync_passes: u64,
}

impl SyncStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            change_sets: self.change_sets.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            retracted: self.retracted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            resync_passes: self.resync_passes.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, value: usize) {
        counter.fetch_add(value as u64, Ordering::Relaxed);
    }
}

/// Handle that stops a running orchestrator.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(broadcast::Sender<()>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(());
    }
}

/// Orchestrator that keeps the index in step with the store.
///
/// The orchestrator:
/// - Runs a full re-sync at start-up and on every `resync_interval` tick
/// - Turns store change sets into publish and retract calls
/// - Handles shutdown signals and waits for in-flight submissions
pub struct Orchestrator {
    store: Arc<dyn DataStore>,
    changes: mpsc::Receiver<StoreMessage>,
    processor: ChangeProcessor,
    loader: IndexLoader,
    resync: ResyncScheduler,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    stats: Arc<SyncStats>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    ///
    /// `changes` is the store's notification channel.
    pub fn new(
        store: Arc<dyn DataStore>,
        changes: mpsc::Receiver<StoreMessage>,
        loader: IndexLoader,
        resync: ResyncScheduler,
    ) -> Self {
        Self::with_config(store, changes, loader, resync, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        store: Arc<dyn DataStore>,
        changes: mpsc::Receiver<StoreMessage>,
        loader: IndexLoader,
        resync: ResyncScheduler,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            store,
            changes,
            processor: ChangeProcessor::new(),
            loader,
            resync,
            config,
            shutdown_tx,
            shutdown_rx,
            stats: Arc::new(SyncStats::default()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<SyncStats> {
        Arc::clone(&self.stats)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run the orchestrator.
    ///
    /// Returns when the store ends its notification stream, on Ctrl-C, or on
    /// [`Orchestrator::shutdown`]. Only a failing start-up re-sync is returned
    /// as an error; later failures are logged and the loop keeps going.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), SyncError> {
        info!("Starting search sync orchestrator");

        if self.config.resync_on_start {
            self.resync_startup().await?;
        }

        let mut resync_timer = interval_at(
            Instant::now() + self.config.resync_interval,
            self.config.resync_interval,
        );
        resync_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut prev = self.stats.snapshot();
        let mut prev_time = std::time::Instant::now();

        info!("Ready to process store changes");

        loop {
            tokio::select! {
                msg = self.changes.recv() => {
                    match msg {
                        Some(StoreMessage::Changes(changes)) => {
                            if let Err(e) = self.process_changes(changes).await {
                                error!(error = %e, "Failed to process change set");
                            }
                        }
                        Some(StoreMessage::ResyncRequested) => {
                            info!("Re-sync requested by store");
                            self.resync_logged().await;
                        }
                        Some(StoreMessage::End) | None => {
                            info!("Store notification stream ended");
                            break;
                        }
                    }
                }
                _ = resync_timer.tick() => {
                    self.resync_logged().await;
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = progress_timer.tick() => {
                    let current = self.stats.snapshot();
                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();

                    let published_per_sec = if elapsed_secs > 0.0 {
                        (current.published.saturating_sub(prev.published) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        change_sets = current.change_sets,
                        published = current.published,
                        retracted = current.retracted,
                        skipped = current.skipped,
                        resync_passes = current.resync_passes,
                        published_per_sec = format!("{:.2}", published_per_sec),
                        "Sync progress"
                    );

                    prev = current;
                    prev_time = now;
                }
            }
        }

        self.loader.flush().await;

        let totals = self.stats.snapshot();
        info!(
            change_sets = totals.change_sets,
            published = totals.published,
            retracted = totals.retracted,
            resync_passes = totals.resync_passes,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Start-up pass. An unavailable backend is not fatal here; the next tick retries.
    async fn resync_startup(&mut self) -> Result<(), SyncError> {
        if let Some(report) = self.resync.run_pass_logged(self.store.as_ref()).await? {
            self.record_resync(report.published, report.retracted);
        }
        Ok(())
    }

    async fn resync_logged(&mut self) {
        match self.resync.run_pass_logged(self.store.as_ref()).await {
            Ok(Some(report)) => self.record_resync(report.published, report.retracted),
            Ok(None) => SyncStats::add(&self.stats.skipped, 1),
            Err(e) => error!(error = %e, "Re-sync pass failed"),
        }
    }

    fn record_resync(&self, published: usize, retracted: usize) {
        SyncStats::add(&self.stats.resync_passes, 1);
        SyncStats::add(&self.stats.published, published);
        SyncStats::add(&self.stats.retracted, retracted);
    }

    /// Route one change set through the processor and loader.
    async fn process_changes(&mut self, changes: ChangeSet) -> Result<(), SyncError> {
        SyncStats::add(&self.stats.change_sets, 1);
        debug!(change_count = changes.len(), "Processing change set");

        let operations = self.processor.process(changes);
        if operations.is_empty() {
            warn!("Change set produced no operations");
            return Ok(());
        }

        let summary = self.loader.load(operations).await?;
        SyncStats::add(&self.stats.published, summary.published);
        SyncStats::add(&self.stats.retracted, summary.retracted);
        SyncStats::add(&self.stats.skipped, summary.skipped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_sync_repository::{IndexSyncService, InMemoryIndexBackend};
    use search_sync_shared::Team;

    use crate::store::{MemoryStore, Transaction};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            channel_buffer_size: 16,
            resync_interval: Duration::from_secs(3600),
            progress_interval: Duration::from_secs(3600),
            resync_on_start: true,
        }
    }

    fn setup(store: Arc<MemoryStore>) -> (Orchestrator, Arc<InMemoryIndexBackend>) {
        let backend = Arc::new(InMemoryIndexBackend::new());
        let service = Arc::new(IndexSyncService::new(backend.clone()));
        let changes = store.subscribe(16);
        let orchestrator = Orchestrator::with_config(
            store,
            changes,
            IndexLoader::new(service.clone()),
            ResyncScheduler::new(service),
            config(),
        );
        (orchestrator, backend)
    }

    #[tokio::test]
    async fn test_startup_resync_then_end() {
        let store = Arc::new(MemoryStore::new());
        store
            .commit(Transaction::new().upsert(Team::new(254, "The Cheesy Poofs")))
            .await
            .unwrap();
        let (mut orchestrator, backend) = setup(store.clone());

        store.close().await;
        orchestrator.run().await.unwrap();

        let stats = orchestrator.stats().snapshot();
        assert_eq!(stats.resync_passes, 1);
        assert!(backend.get("frc254").is_some());
    }

    #[tokio::test]
    async fn test_change_sets_are_applied() {
        let store = Arc::new(MemoryStore::new());
        let (mut orchestrator, backend) = setup(store.clone());

        store
            .commit(
                Transaction::new()
                    .upsert(Team::new(254, "The Cheesy Poofs"))
                    .upsert(Team::new(604, "Quixilver")),
            )
            .await
            .unwrap();
        store
            .commit(Transaction::new().delete("frc604"))
            .await
            .unwrap();
        store.close().await;

        orchestrator.run().await.unwrap();

        let stats = orchestrator.stats().snapshot();
        assert_eq!(stats.change_sets, 2);
        assert_eq!(stats.retracted, 1);
        assert!(backend.get("frc254").is_some());
        assert!(backend.get("frc604").is_none());
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns() {
        let store = Arc::new(MemoryStore::new());
        let (mut orchestrator, _backend) = setup(store);

        orchestrator.shutdown_handle().shutdown();
        orchestrator.run().await.unwrap();
    }
}
