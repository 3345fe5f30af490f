//! Error types for the search sync repository.
//!
//! This module provides a unified error type for all index backend and sync operations.

mod index_error;

pub use index_error::IndexError;
