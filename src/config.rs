//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the executor runtime.
//!
//! ## Sentinel values
//! - `max_jobs = 0` → unlimited (no global gate created)
//! - `max_threads = 0` → logical CPU count
//! - `max_processes = 0` → logical CPU count
//! - `bus_capacity` is clamped to a minimum of 1 by the bus
//!
//! Prefer the helper accessors over reading fields directly to avoid
//! sprinkling sentinel checks across the codebase.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Global configuration for the executor runtime.
///
/// Controls concurrency caps, backend pool sizes, shutdown drain, and the
/// event bus capacity.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of jobs past admission at once (`0` = unlimited).
    pub max_jobs: usize,

    /// Thread pool size for `Backend::Thread` handlers (`0` = logical CPUs).
    ///
    /// Also the capacity of the thread admission gate, so a job is only
    /// admitted when a pool thread is free.
    pub max_threads: usize,

    /// Worker-process pool size for `Backend::Process` handlers
    /// (`0` = logical CPUs). Also the capacity of the process admission gate.
    pub max_processes: usize,

    /// Maximum time `stop` waits for in-flight jobs before force-canceling.
    pub drain: Duration,

    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Subscribers that lag behind more than `bus_capacity` events will skip
    /// older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the global job cap as an `Option`.
    ///
    /// - `None` → unlimited (no gate)
    /// - `Some(n)` → at most `n` jobs hold admission at once
    #[inline]
    pub fn global_limit(&self) -> Option<usize> {
        if self.max_jobs == 0 {
            None
        } else {
            Some(self.max_jobs)
        }
    }

    /// Returns the effective thread pool size (sentinel resolved).
    #[inline]
    pub fn thread_pool_size(&self) -> usize {
        resolve_pool_size(self.max_threads)
    }

    /// Returns the effective worker-process pool size (sentinel resolved).
    #[inline]
    pub fn process_pool_size(&self) -> usize {
        resolve_pool_size(self.max_processes)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn resolve_pool_size(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl Default for Config {
    /// Default configuration:
    /// - `max_jobs = 0` (unlimited)
    /// - `max_threads = 0` (logical CPUs)
    /// - `max_processes = 0` (logical CPUs)
    /// - `drain = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            max_jobs: 0,
            max_threads: 0,
            max_processes: 0,
            drain: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_resolve() {
        let cfg = Config::default();
        assert!(cfg.global_limit().is_none());
        assert!(cfg.thread_pool_size() >= 1);
        assert!(cfg.process_pool_size() >= 1);

        let cfg = Config {
            max_jobs: 4,
            max_threads: 2,
            max_processes: 3,
            ..Config::default()
        };
        assert_eq!(cfg.global_limit(), Some(4));
        assert_eq!(cfg.thread_pool_size(), 2);
        assert_eq!(cfg.process_pool_size(), 3);
    }

    #[test]
    fn bus_capacity_clamped_to_one() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
