//! # Event subscriber trait.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// Receives events via a dedicated worker task with a bounded queue.
///
/// ### Implementation notes
/// - Use async I/O; blocking stalls only this subscriber's queue, but the
///   queue will overflow and drop events.
/// - Handle errors internally; a panic is caught and reported as
///   `SubscriberPanicked`, after which the worker keeps serving.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's dedicated worker; events arrive in FIFO
    /// order relative to this subscriber's queue.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in `SubscriberOverflow` /
    /// `SubscriberPanicked` events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// When the queue is full, new events are dropped for this subscriber
    /// only and a `SubscriberOverflow` event is published.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
