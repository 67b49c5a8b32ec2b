//! # switchboard
//!
//! **Switchboard** is a generic asynchronous job execution engine.
//!
//! It accepts opaque messages, resolves each to zero or more registered
//! handlers by routing key, and executes those handlers under strict
//! concurrency, priority, and cancellation discipline, delivering success,
//! failure, and cancellation notifications back to the message originator.
//!
//! ## Features
//!
//! | Area              | Description                                                            | Key types / traits                      |
//! |-------------------|------------------------------------------------------------------------|-----------------------------------------|
//! | **Routing**       | Map routing keys to ordered handler lists; fan a message out to all.   | [`Registry`], [`HandlerSpec`]           |
//! | **Backends**      | Run handlers cooperatively, on a thread pool, or in worker processes.  | [`Backend`], [`ProcessRoutine`]         |
//! | **Admission**     | Global / per-backend / per-handler caps with priority-ordered waits.   | [`HandlerSpec::with_priority`], [`Config`] |
//! | **Messages**      | Bring your own message type; get exactly one terminal notification.    | [`Adapter`], [`AdapterRef`]             |
//! | **Lifecycle**     | Scoped activation, graceful drain, transitive cancellation.            | [`Executor`], [`ExecutorHandle`], [`WaitFor`] |
//! | **Errors**        | Typed errors for the runtime and for individual jobs.                  | [`RuntimeError`], [`JobError`]          |
//! | **Observability** | Hook into job lifecycle events with isolated subscribers.              | [`Subscribe`], [`Event`], [`EventKind`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use switchboard::{
//!     Adapter, Cancellation, Executor, HandlerSpec, JobError, NotifyError, Registry, WaitFor,
//! };
//!
//! struct Sum(i64, i64);
//!
//! #[async_trait]
//! impl Adapter<(i64, i64), &'static str, i64> for Sum {
//!     fn keys(&self) -> Result<Vec<&'static str>, JobError> {
//!         Ok(vec!["+"])
//!     }
//!
//!     async fn payload(&self) -> Result<(i64, i64), JobError> {
//!         Ok((self.0, self.1))
//!     }
//!
//!     async fn on_success(&self, result: i64) -> Result<(), NotifyError> {
//!         println!("{} + {} = {result}", self.0, self.1);
//!         Ok(())
//!     }
//!
//!     async fn on_failure(&self, error: JobError) -> Result<(), NotifyError> {
//!         println!("{} + {} failed: {error}", self.0, self.1);
//!         Ok(())
//!     }
//!
//!     async fn on_cancel(&self, _c: Cancellation) -> Result<(), NotifyError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(Registry::new());
//!     registry.add(
//!         "+",
//!         HandlerSpec::cooperative("add", |(a, b): (i64, i64)| async move { Ok(a + b) }),
//!     )?;
//!
//!     let executor = Executor::builder(registry).build();
//!     executor
//!         .scope(|handle| async move {
//!             handle.execute(Arc::new(Sum(2, 3)), WaitFor::default()).await
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod adapter;
mod backends;
mod config;
mod core;
mod error;
mod events;
mod gate;
mod handlers;
mod registry;
mod subscribers;

// ---- Public re-exports ----

pub use adapter::{Adapter, AdapterRef};
pub use backends::run_if_worker;
pub use config::Config;
pub use crate::core::{Executor, ExecutorBuilder, ExecutorHandle, WaitFor};
pub use error::{Cancellation, JobError, NotifyError, RuntimeError};
pub use events::{Event, EventKind};
pub use handlers::{Backend, HandlerDesc, HandlerSpec, ProcessRoutine};
pub use registry::Registry;
pub use subscribers::Subscribe;

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
