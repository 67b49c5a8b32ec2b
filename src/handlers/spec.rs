//! # Handler specification builder.
//!
//! A [`HandlerSpec`] bundles a callable with its scheduling knobs before
//! registration:
//!
//! - **Backend** is fixed by the constructor
//!   ([`cooperative`](HandlerSpec::cooperative) / [`thread`](HandlerSpec::thread)
//!   / [`process`](HandlerSpec::process)).
//! - **Knobs** default to: priority `0`, unbounded concurrency, no timeout.
//!
//! ## Example
//! ```
//! use std::time::Duration;
//! use switchboard::{HandlerSpec, JobError};
//!
//! let spec = HandlerSpec::cooperative("add", |(a, b): (i64, i64)| async move {
//!     Ok::<_, JobError>(a + b)
//! })
//! .with_priority(2)
//! .with_max_concurrent(4)
//! .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(spec.name(), "add");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::JobError;

use super::desc::{Backend, HandlerCall, ProcessRoutine};

/// # Specification for a handler awaiting registration.
///
/// Created per backend, tuned with the `with_*` methods, and consumed by
/// [`Registry::add`](crate::Registry::add).
pub struct HandlerSpec<P, R> {
    name: Cow<'static, str>,
    call: HandlerCall<P, R>,
    priority: i8,
    max_concurrent: usize,
    timeout: Option<Duration>,
}

impl<P, R> HandlerSpec<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// A handler that runs on the executor's cooperative scheduler.
    ///
    /// The closure produces a fresh future per job. A future that never
    /// suspends blocks its scheduler slot for its whole run; move such work
    /// to [`thread`](HandlerSpec::thread) if that matters.
    pub fn cooperative<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, JobError>> + Send + 'static,
    {
        let call = move |payload: P| -> BoxFuture<'static, Result<R, JobError>> {
            Box::pin(f(payload))
        };
        Self::new(name, HandlerCall::Cooperative(Arc::new(call)))
    }

    /// A blocking handler that runs on the shared thread pool.
    pub fn thread<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(P) -> Result<R, JobError> + Send + Sync + 'static,
    {
        Self::new(name, HandlerCall::Thread(Arc::new(f)))
    }

    /// A handler that runs on the shared worker-process pool.
    ///
    /// The routine carries both the work and the payload/result codec; see
    /// [`ProcessRoutine`].
    pub fn process(
        name: impl Into<Cow<'static, str>>,
        routine: impl ProcessRoutine<P, R>,
    ) -> Self {
        Self::new(name, HandlerCall::Process(Arc::new(routine)))
    }

    fn new(name: impl Into<Cow<'static, str>>, call: HandlerCall<P, R>) -> Self {
        Self {
            name: name.into(),
            call,
            priority: 0,
            max_concurrent: 0,
            timeout: None,
        }
    }

    /// Sets the admission priority (default `0`; higher admits sooner).
    pub fn with_priority(mut self, priority: i8) -> Self {
        self.priority = priority;
        self
    }

    /// Caps simultaneous executions of this handler (`0` = unbounded).
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Sets a per-execution timeout (no timeout unless set).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The handler name used in events and diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend fixed by the constructor.
    pub fn backend(&self) -> Backend {
        self.call.backend()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Cow<'static, str>,
        HandlerCall<P, R>,
        i8,
        usize,
        Option<Duration>,
    ) {
        (
            self.name,
            self.call,
            self.priority,
            self.max_concurrent,
            self.timeout,
        )
    }
}
