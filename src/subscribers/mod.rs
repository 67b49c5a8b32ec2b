//! # Event subscribers: the observability extension point.
//!
//! A [`Subscribe`] implementation receives every runtime [`Event`](crate::Event)
//! through its own worker task and bounded queue, so a slow or broken
//! subscriber only ever hurts itself:
//!
//! ```text
//! Bus ──► SubscriberSet router ──► [queue] ──► worker ──► subscriber.on_event()
//!                                 (bounded)          └──► panic caught & isolated
//! ```
//!
//! ## Rules
//! - Queue overflow drops the event for that subscriber only and publishes
//!   `SubscriberOverflow`.
//! - Panics are caught and published as `SubscriberPanicked`; the worker
//!   keeps serving.
//! - Subscribers never block publishers or each other.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use set::SubscriberSet;
