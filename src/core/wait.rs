//! # How long `execute` holds the caller.

use std::time::Duration;

/// Used by [`ExecutorHandle::execute`](crate::ExecutorHandle::execute) to
/// decide when to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitFor {
    /// Return as soon as every job is enqueued for admission.
    ///
    /// Enough to know the message will eventually be handled, but without
    /// any back pressure: a busy engine keeps accepting messages faster
    /// than it runs them.
    Enqueue,

    /// Return once every job of this call holds its gate permits (a job
    /// canceled while queued counts as settled).
    ///
    /// The default. Provides natural back pressure: submission slows down to
    /// match the engine's capacity.
    #[default]
    Admission,

    /// Wait up to the given duration for every job of this call to reach a
    /// terminal state. On expiry `execute` returns and the remaining jobs
    /// continue unaffected.
    Completion(Duration),
}
