//! Handles returned by index sync operations.

use tokio::task::JoinHandle;
use tracing::warn;

/// The backend operation a submission performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Index,
    Delete,
    /// Nothing was submitted (empty batch).
    Noop,
}

/// Handle to a submitted backend call.
///
/// Dropping the handle detaches the call, which keeps running in the
/// background. Awaiting [`SubmissionHandle::wait`] only tells the caller that
/// the backend call finished; its outcome goes to the error reporter.
#[derive(Debug)]
pub struct SubmissionHandle {
    kind: SubmissionKind,
    entry_count: usize,
    task: Option<JoinHandle<()>>,
}

impl SubmissionHandle {
    pub(crate) fn spawned(kind: SubmissionKind, entry_count: usize, task: JoinHandle<()>) -> Self {
        Self {
            kind,
            entry_count,
            task: Some(task),
        }
    }

    /// A handle for a call that was never made.
    pub fn noop() -> Self {
        Self {
            kind: SubmissionKind::Noop,
            entry_count: 0,
            task: None,
        }
    }

    pub fn kind(&self) -> SubmissionKind {
        self.kind
    }

    /// Number of entries or ids handed to the backend.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Whether a backend call was spawned.
    pub fn is_submitted(&self) -> bool {
        self.task.is_some()
    }

    /// Whether the backend call has finished (always true for no-op handles).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait until the backend call has finished.
    pub async fn wait(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                warn!(error = %e, kind = ?self.kind, "Submission task did not complete");
            }
        }
    }
}
