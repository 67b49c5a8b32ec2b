//! # Shared thread pool for blocking handlers.
//!
//! A fixed set of OS threads consumes boxed closures from a single queue.
//! The job actor packages the handler call so the result travels back over a
//! `tokio::sync::oneshot`; if the closure panics, the sender is dropped and
//! the actor observes a closed channel instead of a crashed pool thread.
//!
//! ## Rules
//! - The pool is sized once at startup; the thread admission gate has the
//!   same capacity, so a submitted closure always finds a free thread.
//! - Cancellation abandons the in-flight closure: the thread finishes it,
//!   the discarded result fails its `oneshot` send, and the thread moves on.
//! - `close` stops intake; `join_workers` then waits for threads to drain.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crate::error::JobError;

type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads consuming a shared queue.
pub(crate) struct ThreadPool {
    tx: Mutex<Option<mpsc::Sender<WorkItem>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    /// Spawns `size` worker threads. Fails if the OS refuses a thread.
    pub(crate) fn start(size: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<WorkItem>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("switchboard-thread-{n}"))
                .spawn(move || loop {
                    let item = {
                        let guard = rx.lock().unwrap_or_else(|e| e.into_inner());
                        guard.recv()
                    };
                    match item {
                        // A panicking handler must not take the pool thread
                        // with it; the dropped result channel reports it.
                        Ok(item) => {
                            let _ = panic::catch_unwind(AssertUnwindSafe(item));
                        }
                        Err(_) => break,
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Queues one closure for execution.
    pub(crate) fn submit(&self, item: WorkItem) -> Result<(), JobError> {
        let guard = self.lock_tx();
        let tx = guard.as_ref().ok_or_else(|| JobError::Backend {
            reason: "thread pool closed".to_string(),
        })?;
        tx.send(item).map_err(|_| JobError::Backend {
            reason: "thread pool workers gone".to_string(),
        })
    }

    /// Stops intake; idle workers exit once the queue drains.
    pub(crate) fn close(&self) {
        self.lock_tx().take();
    }

    /// Joins all worker threads. Blocking; call from a blocking context.
    ///
    /// Threads still running an abandoned handler finish it first, so the
    /// caller should bound this with its drain deadline.
    pub(crate) fn join_workers(&self) {
        let handles: Vec<_> = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn lock_tx(&self) -> MutexGuard<'_, Option<mpsc::Sender<WorkItem>>> {
        self.tx.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn runs_closures_and_reports_results() {
        let pool = ThreadPool::start(2).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.submit(Box::new(move || {
            let _ = tx.send(21 * 2);
        }))
        .unwrap();
        assert_eq!(rx.await.unwrap(), 42);

        pool.close();
        pool.join_workers();
    }

    #[tokio::test]
    async fn panicking_closure_drops_its_channel_only() {
        let pool = ThreadPool::start(1).unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        pool.submit(Box::new(move || {
            let _tx = tx;
            panic!("boom");
        }))
        .unwrap();
        assert!(rx.await.is_err());

        // The pool thread survived the panic and still takes work.
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.submit(Box::new(move || {
            let _ = tx.send(7);
        }))
        .unwrap();
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap(),
            7
        );

        pool.close();
        pool.join_workers();
    }

    #[test]
    fn submit_after_close_fails() {
        let pool = ThreadPool::start(1).unwrap();
        pool.close();
        let err = pool.submit(Box::new(|| {})).unwrap_err();
        assert_eq!(err.as_label(), "job_backend_failed");
        pool.join_workers();
    }
}
