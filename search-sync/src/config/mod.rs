//! Configuration for the search sync daemon.
//!
//! Everything is read from environment variables (optionally loaded from a
//! `.env` file by the binary) and validated before any component is built.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use search_sync_repository::opensearch::IndexConfig;
use search_sync_repository::IndexSyncConfig;
use tracing::warn;

use crate::orchestrator::OrchestratorConfig;
use crate::resync::ResyncConfig;
use crate::AppError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default index alias.
const DEFAULT_INDEX_ALIAS: &str = "records";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default entry TTL in days.
const DEFAULT_ENTRY_TTL_DAYS: u64 = 30;

/// Default re-sync interval in seconds (one day).
const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default number of records per re-sync page.
const DEFAULT_RESYNC_PAGE_SIZE: usize = 500;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Anything else falls back to "retry".
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            other => {
                warn!(value = %other, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Which index backend the daemon writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenSearch,
    /// Process-local index, for local runs without a cluster.
    Memory,
}

impl BackendKind {
    fn parse(value: Option<&str>) -> Result<Self, AppError> {
        match value.unwrap_or("opensearch").to_lowercase().as_str() {
            "opensearch" => Ok(Self::OpenSearch),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(AppError::config(format!(
                "INDEX_BACKEND must be 'opensearch' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub opensearch_url: String,
    pub index: IndexConfig,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub sync: IndexSyncConfig,
    pub orchestrator: OrchestratorConfig,
    pub resync: ResyncConfig,
    pub page_size: usize,
    /// JSON snapshot used to seed the store.
    pub snapshot_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_BACKEND`: "opensearch" or "memory" (default: opensearch)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_ALIAS`: Index alias name (default: "records")
    /// - `INDEX_VERSION`: Index version number (default: 0)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `ENTRY_TTL_DAYS`: Entry freshness window in days, 0 disables expiry (default: 30)
    /// - `RESYNC_INTERVAL_SECS`: Time between re-sync passes (default: 86400)
    /// - `RESYNC_PAGE_SIZE`: Records per re-sync page (default: 500)
    /// - `RESYNC_RETRACT_MISSING`: Retract indexed entries with no record in the store (default: true)
    /// - `SNAPSHOT_PATH`: JSON snapshot seeding the store (default: none)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = BackendKind::parse(lookup("INDEX_BACKEND").as_deref())?;
        let opensearch_url =
            lookup("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string());
        let index_alias =
            lookup("INDEX_ALIAS").unwrap_or_else(|| DEFAULT_INDEX_ALIAS.to_string());
        let index_version: u32 = parse_var(&lookup, "INDEX_VERSION")?.unwrap_or(0);
        let connection_mode = ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE").as_deref());
        let retry_interval = Duration::from_secs(
            parse_var(&lookup, "OPENSEARCH_RETRY_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
        );

        let ttl_days: u64 = parse_var(&lookup, "ENTRY_TTL_DAYS")?.unwrap_or(DEFAULT_ENTRY_TTL_DAYS);
        let sync = if ttl_days == 0 {
            IndexSyncConfig::no_expiry()
        } else {
            let ttl = ttl_days
                .checked_mul(SECS_PER_DAY)
                .map(Duration::from_secs)
                .filter(|ttl| {
                    chrono::Duration::from_std(*ttl)
                        .ok()
                        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
                        .is_some()
                })
                .ok_or_else(|| {
                    AppError::config(format!("ENTRY_TTL_DAYS ({}) is out of range", ttl_days))
                })?;
            IndexSyncConfig::with_entry_ttl(ttl)
        };

        let resync_interval = Duration::from_secs(
            parse_var(&lookup, "RESYNC_INTERVAL_SECS")?.unwrap_or(DEFAULT_RESYNC_INTERVAL_SECS),
        );
        if resync_interval.is_zero() {
            return Err(AppError::config("RESYNC_INTERVAL_SECS must be positive"));
        }
        if let Some(ttl) = sync.entry_ttl {
            if resync_interval >= ttl {
                return Err(AppError::config(format!(
                    "RESYNC_INTERVAL_SECS ({}s) must be shorter than the entry TTL ({}s)",
                    resync_interval.as_secs(),
                    ttl.as_secs()
                )));
            }
        }

        let page_size: usize =
            parse_var(&lookup, "RESYNC_PAGE_SIZE")?.unwrap_or(DEFAULT_RESYNC_PAGE_SIZE);
        if page_size == 0 {
            return Err(AppError::config("RESYNC_PAGE_SIZE must be positive"));
        }
        let retract_missing: bool = parse_var(&lookup, "RESYNC_RETRACT_MISSING")?.unwrap_or(true);

        Ok(Self {
            backend,
            opensearch_url,
            index: IndexConfig::new(index_alias, index_version),
            connection_mode,
            retry_interval,
            sync,
            orchestrator: OrchestratorConfig {
                resync_interval,
                ..OrchestratorConfig::default()
            },
            resync: ResyncConfig { retract_missing },
            page_size,
            snapshot_path: lookup("SNAPSHOT_PATH").map(PathBuf::from),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::config(format!("{}: {}", key, e))),
        None => Ok(None),
    }
}
