//! Configuration types for the IndexSyncService.

use std::time::Duration;

/// Default freshness window for submitted entries (30 days).
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Configuration for the IndexSyncService.
///
/// Controls the freshness window stamped on every entry. A record that stays
/// in the store longer than the TTL must be re-published by a later sync pass,
/// otherwise the backend drops it silently.
#[derive(Debug, Clone)]
pub struct IndexSyncConfig {
    /// How long a submitted entry stays valid in the backend.
    ///
    /// `None` submits entries without an expiry.
    pub entry_ttl: Option<Duration>,
}

impl Default for IndexSyncConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Some(DEFAULT_ENTRY_TTL),
        }
    }
}

impl IndexSyncConfig {
    /// Create a config whose entries never expire.
    ///
    /// # Warning
    ///
    /// Without an expiry, entries whose deletion notification was lost stay in
    /// the index until a re-sync pass retracts them.
    pub fn no_expiry() -> Self {
        Self { entry_ttl: None }
    }

    /// Create a config with a custom freshness window.
    ///
    /// # Arguments
    ///
    /// * `entry_ttl` - How long each submitted entry stays valid
    pub fn with_entry_ttl(entry_ttl: Duration) -> Self {
        Self {
            entry_ttl: Some(entry_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_thirty_days() {
        let config = IndexSyncConfig::default();
        assert_eq!(config.entry_ttl, Some(Duration::from_secs(2_592_000)));
    }

    #[test]
    fn test_constructors() {
        assert!(IndexSyncConfig::no_expiry().entry_ttl.is_none());
        assert_eq!(
            IndexSyncConfig::with_entry_ttl(Duration::from_secs(60)).entry_ttl,
            Some(Duration::from_secs(60))
        );
    }
}
