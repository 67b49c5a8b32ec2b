//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [queued] job=3 handler=div
//! [admitted] job=3 handler=div
//! [starting] job=3 handler=div
//! [failed] job=3 handler=div err="handler failed: division by zero"
//! [timeout] job=5 handler=slow timeout=100ms
//! [shutdown-requested]
//! [all-stopped-within-drain]
//! ```
//!
//! Not intended for production use; implement a custom
//! [`Subscribe`](crate::Subscribe) for structured logging or metrics.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::subscribe::Subscribe;

/// Stdout logging subscriber, enabled via the `logging` feature.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let job = e.job.map(|id| format!(" job={id}")).unwrap_or_default();
        let handler = e
            .handler
            .as_deref()
            .map(|h| format!(" handler={h}"))
            .unwrap_or_default();

        match e.kind {
            EventKind::JobQueued => println!("[queued]{job}{handler}"),
            EventKind::JobAdmitted => println!("[admitted]{job}{handler}"),
            EventKind::JobStarting => println!("[starting]{job}{handler}"),
            EventKind::JobSucceeded => println!("[succeeded]{job}{handler}"),
            EventKind::JobFailed => {
                println!("[failed]{job}{handler} err={:?}", e.error.as_deref().unwrap_or(""));
            }
            EventKind::JobCanceled => println!("[canceled]{job}{handler}"),
            EventKind::TimeoutHit => {
                println!("[timeout]{job}{handler} timeout={:?}", e.timeout);
            }
            EventKind::NotifyFailed => {
                println!("[notify-failed]{job}{handler} err={:?}", e.error.as_deref().unwrap_or(""));
            }
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::AllStoppedWithin => println!("[all-stopped-within-drain]"),
            EventKind::DrainExceeded => {
                println!("[drain-exceeded] err={:?}", e.error.as_deref().unwrap_or(""));
            }
            EventKind::WorkerSpawned => println!("[worker-spawned]{handler}"),
            EventKind::WorkerExited => println!("[worker-exited]{handler}"),
            EventKind::SubscriberOverflow => println!("[subscriber-overflow]{handler}"),
            EventKind::SubscriberPanicked => println!("[subscriber-panicked]{handler}"),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
