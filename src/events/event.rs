//! # Runtime events emitted by the executor, job actors, and pools.
//!
//! [`EventKind`] classifies events across four categories:
//! - **Job lifecycle**: admission flow and terminal states
//! - **Shutdown**: drain progress during `stop`
//! - **Process pool**: worker spawn/exit
//! - **Subscriber plumbing**: overflow and panic isolation
//!
//! The [`Event`] struct carries metadata such as the job id, handler name,
//! error text, and timeout duration.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so events can be ordered correctly even when delivered
//! out-of-order through async channels.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Job lifecycle events ===
    /// Job created and queued for admission.
    JobQueued,
    /// Job holds all required gate permits.
    JobAdmitted,
    /// Backend dispatch is starting.
    JobStarting,
    /// Handler returned a result; `on_success` will fire.
    JobSucceeded,
    /// Handler (or dispatch) failed; `on_failure` will fire.
    JobFailed,
    /// Job canceled before completion; `on_cancel` will fire.
    JobCanceled,
    /// Job hit its configured timeout (the job also fails).
    TimeoutHit,
    /// A notification callback returned an error or panicked.
    NotifyFailed,

    // === Shutdown events ===
    /// Graceful shutdown initiated.
    ShutdownRequested,
    /// All jobs settled within the drain window.
    AllStoppedWithin,
    /// Drain deadline exceeded; remaining jobs were force-canceled.
    DrainExceeded,

    // === Process pool events ===
    /// A worker process was spawned.
    WorkerSpawned,
    /// A worker process exited or was killed.
    WorkerExited,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event classification.
    pub kind: EventKind,
    /// Monotonic sequence number, unique across the process.
    pub seq: u64,
    /// Wall-clock time the event was created.
    pub at: SystemTime,
    /// Job id, for job lifecycle events.
    pub job: Option<u64>,
    /// Handler (or subscriber/worker) name.
    pub handler: Option<String>,
    /// Error text, when the event reports a failure.
    pub error: Option<String>,
    /// Timeout duration, for `TimeoutHit`.
    pub timeout: Option<Duration>,
}

impl Event {
    /// Creates an event stamped with the current time and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            job: None,
            handler: None,
            error: None,
            timeout: None,
        }
    }

    /// Attaches a job id.
    pub fn with_job(mut self, id: u64) -> Self {
        self.job = Some(id);
        self
    }

    /// Attaches a handler (or subscriber/worker) name.
    pub fn with_handler(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(name.into());
        self
    }

    /// Attaches error text.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches a timeout duration.
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::now(EventKind::JobQueued);
        let b = Event::now(EventKind::JobQueued);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = Event::now(EventKind::JobFailed)
            .with_job(7)
            .with_handler("div")
            .with_error("boom")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(ev.kind, EventKind::JobFailed);
        assert_eq!(ev.job, Some(7));
        assert_eq!(ev.handler.as_deref(), Some("div"));
        assert_eq!(ev.error.as_deref(), Some("boom"));
        assert_eq!(ev.timeout, Some(Duration::from_secs(5)));
    }
}
