//! # The message boundary: routing keys, payload, terminal notifications.
//!
//! An [`Adapter`] wraps one inbound message. The executor asks it for routing
//! keys, materializes the payload once per job, and reports the job's terminal
//! state through exactly one of the three callbacks.
//!
//! ## Contract
//! - [`keys`](Adapter::keys) is called once per `execute`; an error aborts the
//!   call before any job exists.
//! - [`payload`](Adapter::payload) is called exactly once per (message,
//!   handler) pair, cooperatively; it may suspend.
//! - Exactly one of [`on_success`](Adapter::on_success),
//!   [`on_failure`](Adapter::on_failure), [`on_cancel`](Adapter::on_cancel)
//!   fires per job, exactly once.
//! - One message may fan out into several jobs; callbacks must tolerate being
//!   invoked concurrently for different jobs of the same message.
//!
//! A callback returning `Err` (or panicking) is contained by the runtime:
//! the failure is published as a `NotifyFailed` event and handed to the
//! executor's `on_notify_error` hook.
//!
//! ## Example
//! ```
//! use async_trait::async_trait;
//! use switchboard::{Adapter, Cancellation, JobError, NotifyError};
//!
//! struct Division {
//!     left: i64,
//!     right: i64,
//! }
//!
//! #[async_trait]
//! impl Adapter<(i64, i64), &'static str, f64> for Division {
//!     fn keys(&self) -> Result<Vec<&'static str>, JobError> {
//!         Ok(vec!["/"])
//!     }
//!
//!     async fn payload(&self) -> Result<(i64, i64), JobError> {
//!         Ok((self.left, self.right))
//!     }
//!
//!     async fn on_success(&self, result: f64) -> Result<(), NotifyError> {
//!         println!("{} / {} = {result}", self.left, self.right);
//!         Ok(())
//!     }
//!
//!     async fn on_failure(&self, error: JobError) -> Result<(), NotifyError> {
//!         println!("{} / {} failed: {error}", self.left, self.right);
//!         Ok(())
//!     }
//!
//!     async fn on_cancel(&self, _cancellation: Cancellation) -> Result<(), NotifyError> {
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Cancellation, JobError, NotifyError};

/// # Shared handle to an adapter.
///
/// One message can fan out into several jobs; they all share this handle.
pub type AdapterRef<P, K, R> = Arc<dyn Adapter<P, K, R>>;

/// # One inbound message: routing, payload, notifications.
///
/// See the [module docs](self) for the full contract.
#[async_trait]
pub trait Adapter<P, K, R>: Send + Sync + 'static {
    /// Returns the routing keys this message targets (zero, one, or many).
    ///
    /// An error propagates to the `execute` caller; no jobs are created.
    fn keys(&self) -> Result<Vec<K>, JobError>;

    /// Materializes the payload for one job.
    ///
    /// Called exactly once per (message, handler) pair. An error fails that
    /// job and is delivered to [`on_failure`](Adapter::on_failure).
    async fn payload(&self) -> Result<P, JobError>;

    /// The job's handler returned a result.
    async fn on_success(&self, result: R) -> Result<(), NotifyError>;

    /// The job failed: handler error, timeout, or backend dispatch failure.
    async fn on_failure(&self, error: JobError) -> Result<(), NotifyError>;

    /// The job was canceled before producing a result.
    async fn on_cancel(&self, cancellation: Cancellation) -> Result<(), NotifyError>;
}
