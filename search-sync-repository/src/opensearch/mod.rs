//! OpenSearch implementation of the index backend.
//!
//! This module provides a concrete implementation of `IndexBackend`
//! using OpenSearch as the external search index.

mod backend;
mod index_config;

pub use backend::OpenSearchBackend;
pub use index_config::{get_index_settings, get_versioned_index_name, IndexConfig};
