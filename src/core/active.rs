//! # Tracks currently running jobs.
//!
//! Job actors insert themselves when dispatch starts and remove themselves on
//! any terminal transition. The executor snapshots the set when the drain
//! deadline expires to name the jobs it is about to force-cancel.

use dashmap::DashMap;

/// Concurrent set of running jobs, keyed by job id.
#[derive(Default)]
pub(crate) struct ActiveSet {
    jobs: DashMap<u64, String>,
}

impl ActiveSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks a job as running.
    pub(crate) fn insert(&self, id: u64, label: String) {
        self.jobs.insert(id, label);
    }

    /// Clears a job on terminal transition.
    pub(crate) fn remove(&self, id: u64) {
        self.jobs.remove(&id);
    }

    /// Returns a sorted snapshot of running job labels.
    pub(crate) fn snapshot(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.jobs.iter().map(|e| e.value().clone()).collect();
        labels.sort_unstable();
        labels
    }
}
