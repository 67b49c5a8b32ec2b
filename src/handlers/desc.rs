//! # The sealed handler record and its three callable shapes.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::JobError;

/// Where a handler body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// On the executor's own cooperative scheduler.
    ///
    /// The default. Right for async handlers and for sync handlers fast
    /// enough that blocking the scheduler slot is acceptable.
    Cooperative,

    /// On the shared thread pool.
    ///
    /// Right for slow, blocking, IO-bound handlers.
    Thread,

    /// On the shared worker-process pool.
    ///
    /// Right for CPU-bound handlers. Payload and result cross a process
    /// boundary; the handler supplies the codec via [`ProcessRoutine`].
    Process,
}

impl Backend {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            Backend::Cooperative => "cooperative",
            Backend::Thread => "thread",
            Backend::Process => "process",
        }
    }
}

/// # A process-backend handler with its serialization boundary.
///
/// The engine does not impose a wire format on payloads or results; the
/// routine owns both the codec and the work:
///
/// - [`encode`](ProcessRoutine::encode) runs in the parent, turning the
///   payload into bytes for the worker.
/// - [`run`](ProcessRoutine::run) runs **inside the worker process** (the
///   binary re-spawned with the worker marker; see
///   [`run_if_worker`](crate::run_if_worker)).
/// - [`decode`](ProcessRoutine::decode) runs in the parent, turning the
///   worker's bytes back into a result.
///
/// Panics inside `run` are caught by the worker loop and reported to the
/// parent as an error frame.
pub trait ProcessRoutine<P, R>: Send + Sync + 'static {
    /// Encodes the payload for transfer to the worker process.
    fn encode(&self, payload: P) -> Result<Vec<u8>, JobError>;

    /// Executes the handler body on the encoded payload, in the worker.
    fn run(&self, payload: &[u8]) -> Result<Vec<u8>, String>;

    /// Decodes the worker's result bytes.
    fn decode(&self, bytes: Vec<u8>) -> Result<R, JobError>;
}

/// The callable in one of its three backend shapes.
pub(crate) enum HandlerCall<P, R> {
    Cooperative(Arc<dyn Fn(P) -> BoxFuture<'static, Result<R, JobError>> + Send + Sync>),
    Thread(Arc<dyn Fn(P) -> Result<R, JobError> + Send + Sync>),
    Process(Arc<dyn ProcessRoutine<P, R>>),
}

impl<P, R> Clone for HandlerCall<P, R> {
    fn clone(&self) -> Self {
        match self {
            HandlerCall::Cooperative(f) => HandlerCall::Cooperative(f.clone()),
            HandlerCall::Thread(f) => HandlerCall::Thread(f.clone()),
            HandlerCall::Process(r) => HandlerCall::Process(r.clone()),
        }
    }
}

impl<P, R> HandlerCall<P, R> {
    pub(crate) fn backend(&self) -> Backend {
        match self {
            HandlerCall::Cooperative(_) => Backend::Cooperative,
            HandlerCall::Thread(_) => Backend::Thread,
            HandlerCall::Process(_) => Backend::Process,
        }
    }
}

/// # One registered handler: callable plus scheduling knobs.
///
/// Built by [`Registry::add`](crate::Registry::add) from a
/// [`HandlerSpec`](crate::HandlerSpec); immutable afterwards. The `id` is the
/// handler's position in global registration order and doubles as its
/// identity on the process-backend wire.
pub struct HandlerDesc<P, K, R> {
    id: u32,
    name: Cow<'static, str>,
    key: K,
    call: HandlerCall<P, R>,
    priority: i8,
    max_concurrent: usize,
    timeout: Option<Duration>,
}

impl<P, K, R> HandlerDesc<P, K, R> {
    pub(crate) fn new(
        id: u32,
        key: K,
        name: Cow<'static, str>,
        call: HandlerCall<P, R>,
        priority: i8,
        max_concurrent: usize,
        timeout: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            key,
            call,
            priority,
            max_concurrent,
            timeout,
        })
    }

    /// Registration-order id, stable for the life of the registry.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Human-readable handler name, used in events and diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The routing key this handler is registered under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The backend the handler body runs on.
    pub fn backend(&self) -> Backend {
        self.call.backend()
    }

    /// Admission priority; higher admits sooner.
    pub fn priority(&self) -> i8 {
        self.priority
    }

    /// Per-handler concurrency cap.
    ///
    /// - `None` → unbounded (no per-handler gate)
    /// - `Some(n)` → at most `n` simultaneous executions
    pub fn max_concurrent(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Per-execution timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn call(&self) -> &HandlerCall<P, R> {
        &self.call
    }
}
