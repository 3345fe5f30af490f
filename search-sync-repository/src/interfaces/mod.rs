//! Interface definitions for the index sync service.
//!
//! This module defines the abstract `IndexBackend` trait that allows for
//! dependency injection and swappable index implementations, and the
//! `ErrorReporter` sink that observes asynchronous failures.

mod error_reporter;
mod index_backend;

pub use error_reporter::{ErrorReporter, TracingErrorReporter};
pub use index_backend::IndexBackend;
