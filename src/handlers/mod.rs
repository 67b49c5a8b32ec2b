//! # Handler descriptors: what to run, where, and under which limits.
//!
//! - [`HandlerSpec`] — the public builder a user registers under a routing key.
//! - [`HandlerDesc`] — the sealed, immutable record the executor schedules.
//! - [`Backend`] — where the handler body runs (cooperative / thread / process).
//! - [`ProcessRoutine`] — the explicit serialization boundary for process
//!   handlers.

mod desc;
mod spec;

pub use desc::{Backend, HandlerDesc, ProcessRoutine};
pub use spec::HandlerSpec;

pub(crate) use desc::HandlerCall;
