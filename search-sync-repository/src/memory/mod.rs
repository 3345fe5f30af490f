//! In-memory implementation of the index backend.
//!
//! This module provides an `IndexBackend` that keeps entries in a process-local
//! map. It honours entry expiry on reads, which makes it suitable for local
//! runs and for exercising re-sync behaviour in tests.

mod backend;

pub use backend::InMemoryIndexBackend;
