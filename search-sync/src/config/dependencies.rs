//! Dependency initialization and wiring for the search sync daemon.

use std::sync::Arc;
use std::time::Duration;

use search_sync_repository::opensearch::IndexConfig;
use search_sync_repository::{
    IndexBackend, IndexSyncService, InMemoryIndexBackend, OpenSearchBackend, TracingErrorReporter,
};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{AppConfig, BackendKind, ConnectionMode};
use crate::loader::IndexLoader;
use crate::orchestrator::Orchestrator;
use crate::resync::ResyncScheduler;
use crate::store::MemoryStore;
use crate::AppError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The local store. Commits made through it reach the orchestrator.
    pub store: Arc<MemoryStore>,
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from a resolved configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If the snapshot cannot be loaded or, in fail-fast
    ///   mode, the index cannot be reached
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        info!(
            backend = ?config.backend,
            opensearch_url = %config.opensearch_url,
            index_alias = %config.index.alias,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let store = Arc::new(match &config.snapshot_path {
            Some(path) => MemoryStore::from_snapshot_file(path, config.page_size)?,
            None => MemoryStore::with_page_size(config.page_size),
        });
        info!(records = store.len(), "Store ready");

        let backend: Arc<dyn IndexBackend> = match config.backend {
            BackendKind::OpenSearch => Arc::new(
                Self::connect_to_opensearch(
                    &config.opensearch_url,
                    config.index.clone(),
                    config.connection_mode,
                    config.retry_interval,
                )
                .await?,
            ),
            BackendKind::Memory => {
                warn!("Using the in-memory index backend; entries are lost on exit");
                Arc::new(InMemoryIndexBackend::new())
            }
        };

        let service = Arc::new(IndexSyncService::with_config(
            backend,
            Arc::new(TracingErrorReporter),
            config.sync.clone(),
        ));

        let changes = store.subscribe(config.orchestrator.channel_buffer_size);
        let orchestrator = Orchestrator::with_config(
            store.clone(),
            changes,
            IndexLoader::new(Arc::clone(&service)),
            ResyncScheduler::with_config(service, config.resync.clone()),
            config.orchestrator.clone(),
        );

        Ok(Self {
            store,
            orchestrator,
        })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        index_config: IndexConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchBackend, AppError> {
        loop {
            match Self::try_connect_opensearch(url, index_config.clone()).await {
                Ok(backend) => {
                    info!("OpenSearch connection established");
                    return Ok(backend);
                }
                Err(e) => match mode {
                    ConnectionMode::FailFast => return Err(e),
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Build the client and make sure the index and alias exist.
    async fn try_connect_opensearch(
        url: &str,
        index_config: IndexConfig,
    ) -> Result<OpenSearchBackend, AppError> {
        let backend = OpenSearchBackend::new(url, index_config)
            .await
            .map_err(|e| AppError::config(format!("Failed to create OpenSearch backend: {}", e)))?;

        backend
            .ensure_index_exists()
            .await
            .map_err(|e| AppError::config(format!("Failed to ensure index exists: {}", e)))?;

        Ok(backend)
    }
}
