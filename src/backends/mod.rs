//! # Execution backends: thread pool and worker-process pool.
//!
//! Cooperative handlers need no backend machinery (their futures run inside
//! the job's own task); this module provides the two out-of-scheduler
//! backends:
//!
//! - [`thread::ThreadPool`] — shared OS threads for blocking handlers.
//! - [`process::ProcessPool`] — shared worker processes for CPU-bound
//!   handlers, speaking length-prefixed frames over stdin/stdout.
//!
//! Both pools are created lazily on first dispatch and torn down during
//! executor shutdown. Both present the same completion contract to the job
//! actor: a future resolving to result-or-error that tolerates being dropped
//! on cancellation.

pub(crate) mod ipc;
pub(crate) mod process;
pub(crate) mod thread;

pub use process::run_if_worker;
