//! Processor module for the search sync daemon.
//!
//! Turns store change sets into index operations.

mod change_processor;

pub use change_processor::{ChangeProcessor, SyncOperation};
