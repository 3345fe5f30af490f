//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the record search index.

use serde_json::{json, Value};

/// Configuration for the search index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The alias name for the search index (used for all operations).
    pub alias: String,
    /// The version number for the index (e.g., 0 for "<alias>_v0").
    pub version: u32,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `alias` - The index alias name
    /// * `version` - The version number
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// The concrete index the alias points at.
    pub fn versioned_index_name(&self) -> String {
        get_versioned_index_name(&self.alias, Some(self.version))
    }
}

/// Get the versioned index name for an alias.
///
/// Deployments with different aliases get different physical indices.
///
/// # Arguments
///
/// * `alias` - The index alias name
/// * `version` - The version number (defaults to 0 if None)
///
/// # Returns
///
/// The versioned index name (e.g., "records_v0" for alias "records")
pub fn get_versioned_index_name(alias: &str, version: Option<u32>) -> String {
    let v = version.unwrap_or(0);
    format!("{}_v{}", alias, v)
}

/// Get the index settings and mappings for the record search index.
///
/// The configuration includes:
/// - **search_as_you_type**: Autocomplete on title and description
/// - **Keyword fields**: For exact id lookups and de-duplication against the web index
/// - **expires_at**: Date field; expired entries are removed by delete-by-query on every re-sync pass
///
/// Attributes not listed here are mapped dynamically.
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic": true,
            "properties": {
                "id": {
                    "type": "keyword"
                },
                "related_id": {
                    "type": "keyword"
                },
                "content_url": {
                    "type": "keyword",
                    "index": false
                },
                "title": {
                    "type": "search_as_you_type",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "description": {
                    "type": "search_as_you_type"
                },
                "keywords": {
                    "type": "keyword"
                },
                "location": {
                    "type": "text"
                },
                "team_number": {
                    "type": "integer"
                },
                "year": {
                    "type": "integer"
                },
                "start_date": {
                    "type": "date"
                },
                "end_date": {
                    "type": "date"
                },
                "expires_at": {
                    "type": "date"
                },
                "indexed_at": {
                    "type": "date"
                }
            }
        }
    })
}
