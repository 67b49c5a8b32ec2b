//! # Runtime events: broadcast bus and event types.
//!
//! Every job lifecycle transition, shutdown step, and pool action publishes an
//! [`Event`] on the [`Bus`]. Subscribers (see [`crate::subscribers`]) consume
//! the stream for logging, metrics, or test assertions.
//!
//! Delivery is fire-and-forget: a bounded broadcast ring plus per-subscriber
//! bounded queues. Events carry a globally monotonic sequence number so
//! consumers can re-order if a channel delivers late.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
