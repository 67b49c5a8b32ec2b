//! # Error types used by the switchboard runtime and jobs.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] errors raised by the orchestration runtime itself.
//! - [`JobError`] errors raised by (or on behalf of) individual job executions,
//!   delivered to [`Adapter::on_failure`](crate::Adapter::on_failure).
//!
//! plus two small notification-side types:
//!
//! - [`Cancellation`] the value delivered to [`Adapter::on_cancel`](crate::Adapter::on_cancel).
//! - [`NotifyError`] a failure inside a notification callback; contained, never
//!   propagated into another job.
//!
//! All error types provide `as_label()` returning a short stable snake_case
//! label for logs/metrics.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the switchboard runtime.
///
/// These represent failures in the orchestration system itself, as opposed to
/// failures of individual handler executions (see [`JobError`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Attempted to register a handler after an executor sealed the registry.
    #[error("registry is sealed, cannot register handler '{handler}'")]
    AlreadyRunning {
        /// Name of the handler that could not be registered.
        handler: String,
    },

    /// The adapter's key iteration failed; no jobs were created.
    #[error("adapter key iteration failed: {reason}")]
    Keys {
        /// Stringified adapter error.
        reason: String,
    },

    /// `execute` was called after `stop` began.
    #[error("executor is stopped")]
    Stopped,

    /// Drain deadline was exceeded during shutdown; the remaining jobs were
    /// force-canceled.
    #[error("drain deadline {drain:?} exceeded; still running: {stuck:?}; forcing cancel")]
    DrainExceeded {
        /// The configured drain duration.
        drain: Duration,
        /// Labels of jobs that were still running at the deadline.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyRunning { .. } => "runtime_already_running",
            RuntimeError::Keys { .. } => "runtime_keys_failed",
            RuntimeError::Stopped => "runtime_stopped",
            RuntimeError::DrainExceeded { .. } => "runtime_drain_exceeded",
        }
    }
}

/// # Errors produced by job execution.
///
/// Every variant ends the job in the FAILED state and is delivered to the
/// adapter via `on_failure`. Cancellation is *not* an error; it takes the
/// separate `on_cancel` path (see [`Cancellation`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// Handler execution exceeded its configured timeout.
    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The handler body reported a failure.
    #[error("handler failed: {reason}")]
    Handler { reason: String },

    /// Dispatch failed before (or around) the handler running: pool closed,
    /// worker process died or could not be spawned, payload codec error.
    #[error("backend dispatch failed: {reason}")]
    Backend { reason: String },
}

impl JobError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Timeout { .. } => "job_timeout",
            JobError::Handler { .. } => "job_handler_failed",
            JobError::Backend { .. } => "job_backend_failed",
        }
    }
}

impl From<String> for JobError {
    fn from(reason: String) -> Self {
        JobError::Handler { reason }
    }
}

impl From<&str> for JobError {
    fn from(reason: &str) -> Self {
        JobError::Handler {
            reason: reason.to_string(),
        }
    }
}

/// # Why a job was canceled, delivered to `on_cancel`.
///
/// Records where the job was in its lifecycle when the cancellation signal
/// won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// The job was still waiting for gate admission.
    WhileQueued,
    /// The job had been admitted; its handler may have started running.
    WhileRunning,
}

impl Cancellation {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            Cancellation::WhileQueued => "canceled_while_queued",
            Cancellation::WhileRunning => "canceled_while_running",
        }
    }
}

/// # A failure inside a notification callback.
///
/// Produced when `on_success`/`on_failure`/`on_cancel` returns an error or
/// panics. Published on the event bus as `NotifyFailed` and forwarded to the
/// executor's `on_notify_error` hook; never allowed to leak into another job.
#[derive(Error, Debug)]
#[error("notification failed: {reason}")]
pub struct NotifyError {
    /// Stringified callback error or panic payload.
    pub reason: String,
}

impl From<String> for NotifyError {
    fn from(reason: String) -> Self {
        NotifyError { reason }
    }
}

impl From<&str> for NotifyError {
    fn from(reason: &str) -> Self {
        NotifyError {
            reason: reason.to_string(),
        }
    }
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
