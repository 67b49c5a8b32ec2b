//! Runtime core: orchestration and lifecycle.
//!
//! The public API re-exported from here is [`Executor`] / [`ExecutorBuilder`]
//! / [`ExecutorHandle`] / [`WaitFor`]; everything else is an internal
//! building block the executor wires together.
//!
//! ## Files & responsibilities
//! - **executor.rs**: public facade; owns the runtime (Bus, gates, pools,
//!   SubscriberSet, ActiveSet, tokens), fans messages out into jobs, drives
//!   graceful shutdown.
//! - **builder.rs**: assembles an executor from registry, config,
//!   subscribers, and the notify-error hook.
//! - **job.rs**: per-job state machine: cancellable gate admission, payload
//!   materialization, backend dispatch with timeout, permit release,
//!   exactly-one notification.
//! - **active.rs**: concurrent set of running jobs, snapshotted for
//!   `DrainExceeded` diagnostics.
//! - **wait.rs**: the `WaitFor` submission modes.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Application code
//!   └─ registers HandlerSpecs, builds Executor, calls start()/scope()
//!
//! ExecutorHandle::execute(adapter, wait)
//!   ├─ adapter.keys()            (error → no jobs, RuntimeError::Keys)
//!   ├─ registry lookup per key   (unknown key → silently skipped)
//!   ├─ spawn JobActor per (adapter, handler) onto the TaskTracker
//!   └─ wait per WaitFor: Enqueue | Admission | Completion(duration)
//!
//! JobActor::run()
//!   ├─ acquire gates: global → backend → handler   (priority-ordered)
//!   ├─ payload → backend dispatch                  (timeout armed)
//!   ├─ release permits (reverse order)
//!   └─ exactly one of on_success / on_failure / on_cancel
//! ```

mod active;
mod builder;
mod executor;
mod job;
mod wait;

pub use builder::ExecutorBuilder;
pub use executor::{Executor, ExecutorHandle};
pub use wait::WaitFor;
