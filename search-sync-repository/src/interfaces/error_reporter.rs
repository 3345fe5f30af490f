//! Diagnostic sink for failures observed after a call has returned.

use tracing::error;

use crate::errors::IndexError;

/// Fire-and-forget sink for asynchronous index failures.
///
/// `report` is called from background tasks. Implementations must not panic
/// and must not block.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &IndexError);
}

/// Reports errors as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, err: &IndexError) {
        error!(error = %err, "Index backend reported a failure");
    }
}
