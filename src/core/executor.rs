//! # Executor: accept messages, fan out jobs, orchestrate shutdown.
//!
//! [`Executor::start`] seals the registry and wires the runtime together;
//! the returned [`ExecutorHandle`] is the submission surface. For guaranteed
//! cleanup on every exit path use [`Executor::scope`].
//!
//! ## Shutdown timeline
//! ```text
//! stop()
//!   ├─► publish ShutdownRequested; reject further execute calls
//!   ├─► cancel admission token     → queued jobs settle as CANCELED
//!   ├─► wait up to Config::drain   → running jobs finish normally
//!   │     └─ deadline hit → snapshot stuck jobs, cancel runtime token,
//!   │        await remaining notifications, report DrainExceeded
//!   └─► tear down pools, flush subscribers
//! ```

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::adapter::AdapterRef;
use crate::backends::process::ProcessPool;
use crate::backends::thread::ThreadPool;
use crate::config::Config;
use crate::error::{JobError, NotifyError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::gate::Gate;
use crate::handlers::HandlerDesc;
use crate::registry::Registry;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::active::ActiveSet;
use super::job::JobActor;
use super::wait::WaitFor;

/// Hook receiving notification-callback failures.
pub(crate) type NotifyHook = Arc<dyn Fn(&NotifyError) + Send + Sync>;

/// A configured engine, not yet running.
///
/// Built via [`Executor::builder`]; consumed by [`start`](Executor::start)
/// or [`scope`](Executor::scope).
pub struct Executor<P, K, R> {
    pub(crate) registry: Arc<Registry<P, K, R>>,
    pub(crate) cfg: Config,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) notify_hook: Option<NotifyHook>,
}

/// Everything the running engine shares with its job actors.
pub(crate) struct Shared<P, K, R> {
    pub(crate) registry: Arc<Registry<P, K, R>>,
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) active: ActiveSet,
    pub(crate) notify_hook: Option<NotifyHook>,
    /// Hard-cancel signal: parents every job token.
    pub(crate) runtime_token: CancellationToken,
    /// Graceful signal: queued jobs stop waiting for admission.
    pub(crate) admission_token: CancellationToken,
    subscribers: SubscriberSet,
    tracker: TaskTracker,
    global_gate: Option<Arc<Gate>>,
    thread_gate: Arc<Gate>,
    process_gate: Arc<Gate>,
    handler_gates: Vec<Option<Arc<Gate>>>,
    thread_pool: OnceLock<Result<Arc<ThreadPool>, String>>,
    process_pool: ProcessPool,
    job_seq: AtomicU64,
    stopped: AtomicBool,
}

impl<P, K, R> Executor<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Starts building an executor over `registry`.
    pub fn builder(registry: Arc<Registry<P, K, R>>) -> super::builder::ExecutorBuilder<P, K, R> {
        super::builder::ExecutorBuilder::new(registry)
    }

    /// Seals the registry and starts the engine.
    ///
    /// Must be called from within a tokio runtime (it spawns the subscriber
    /// pipeline). Backend pools are created lazily on first dispatch, so
    /// `start` itself cannot fail; dispatch-time pool failures surface
    /// per-job as [`JobError::Backend`].
    pub fn start(self) -> ExecutorHandle<P, K, R> {
        self.registry.seal();

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subscribers = SubscriberSet::start(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();
        let admission_token = runtime_token.child_token();

        let handler_gates = (0..self.registry.len() as u32)
            .map(|id| {
                self.registry
                    .by_id(id)
                    .and_then(|desc| desc.max_concurrent())
                    .map(Gate::new)
            })
            .collect();

        let shared = Arc::new(Shared {
            bus: bus.clone(),
            active: ActiveSet::new(),
            notify_hook: self.notify_hook,
            subscribers,
            tracker: TaskTracker::new(),
            global_gate: self.cfg.global_limit().map(Gate::new),
            thread_gate: Gate::new(self.cfg.thread_pool_size()),
            process_gate: Gate::new(self.cfg.process_pool_size()),
            handler_gates,
            thread_pool: OnceLock::new(),
            process_pool: ProcessPool::new(bus),
            job_seq: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            runtime_token,
            admission_token,
            registry: self.registry,
            cfg: self.cfg,
        });

        ExecutorHandle { shared }
    }

    /// Scoped activation: starts the engine, runs `f` with a handle, and
    /// stops on every exit path.
    ///
    /// A closure error wins over a shutdown error; otherwise a
    /// [`RuntimeError::DrainExceeded`] from the final stop is surfaced.
    pub async fn scope<F, Fut, T>(self, f: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(ExecutorHandle<P, K, R>) -> Fut,
        Fut: Future<Output = Result<T, RuntimeError>>,
    {
        let handle = self.start();
        let result = f(handle.clone()).await;
        let stopped = handle.stop().await;
        let value = result?;
        stopped?;
        Ok(value)
    }
}

/// Submission surface of a running engine. Cheap to clone.
pub struct ExecutorHandle<P, K, R> {
    shared: Arc<Shared<P, K, R>>,
}

impl<P, K, R> Clone for ExecutorHandle<P, K, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<P, K, R> ExecutorHandle<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Submits a message: one job per (key, registered handler) pair.
    ///
    /// Keys without handlers are silently ignored; a message yielding no
    /// keys is a no-op. `wait` decides when the call returns; the jobs
    /// themselves always run to a terminal notification regardless.
    pub async fn execute(
        &self,
        adapter: AdapterRef<P, K, R>,
        wait: WaitFor,
    ) -> Result<(), RuntimeError> {
        let (admissions, completions) = self.spawn_jobs(adapter)?;

        match wait {
            WaitFor::Enqueue => {}
            WaitFor::Admission => {
                for rx in admissions {
                    // A job canceled before admission drops its sender;
                    // either way the admission question is settled.
                    let _ = rx.await;
                }
            }
            WaitFor::Completion(dur) => {
                let all = futures::future::join_all(completions);
                let _ = tokio::time::timeout(dur, all).await;
            }
        }
        Ok(())
    }

    /// Fire-and-forget submission: enqueues jobs and returns immediately.
    ///
    /// Equivalent to [`execute`](ExecutorHandle::execute) with
    /// [`WaitFor::Enqueue`], but callable from synchronous code.
    pub fn schedule(&self, adapter: AdapterRef<P, K, R>) -> Result<(), RuntimeError> {
        self.spawn_jobs(adapter).map(|_| ())
    }

    #[allow(clippy::type_complexity)]
    fn spawn_jobs(
        &self,
        adapter: AdapterRef<P, K, R>,
    ) -> Result<(Vec<oneshot::Receiver<()>>, Vec<oneshot::Receiver<()>>), RuntimeError> {
        let shared = &self.shared;
        if shared.stopped.load(AtomicOrdering::Acquire) {
            return Err(RuntimeError::Stopped);
        }

        // Collect keys up front: an iteration error must abort the call
        // before any job exists.
        let keys = adapter.keys().map_err(|e| RuntimeError::Keys {
            reason: e.to_string(),
        })?;

        let mut admissions = Vec::new();
        let mut completions = Vec::new();
        for key in keys {
            for desc in shared.registry.handlers_for(&key) {
                let id = shared.job_seq.fetch_add(1, AtomicOrdering::Relaxed);
                let (admitted_tx, admitted_rx) = oneshot::channel();
                let (done_tx, done_rx) = oneshot::channel();
                let actor = JobActor::new(
                    id,
                    adapter.clone(),
                    desc,
                    shared.clone(),
                    shared.runtime_token.child_token(),
                    admitted_tx,
                    done_tx,
                );
                shared.tracker.spawn(actor.run());
                admissions.push(admitted_rx);
                completions.push(done_rx);
            }
        }
        Ok((admissions, completions))
    }

    /// Graceful shutdown; idempotent, the first caller drives it.
    ///
    /// Jobs already running get up to [`Config::drain`] to finish; whatever
    /// remains is force-canceled (each such job still receives `on_cancel`)
    /// and reported via [`RuntimeError::DrainExceeded`].
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        let shared = &self.shared;
        if shared.stopped.swap(true, AtomicOrdering::AcqRel) {
            return Ok(());
        }

        shared.bus.publish(Event::now(EventKind::ShutdownRequested));
        shared.admission_token.cancel();
        shared.tracker.close();

        let drain = shared.cfg.drain;
        let result = match tokio::time::timeout(drain, shared.tracker.wait()).await {
            Ok(()) => {
                shared.bus.publish(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = shared.active.snapshot();
                shared.bus.publish(
                    Event::now(EventKind::DrainExceeded).with_error(format!("stuck: {stuck:?}")),
                );
                shared.runtime_token.cancel();
                // Canceled jobs still owe their notifications; wait them out.
                shared.tracker.wait().await;
                Err(RuntimeError::DrainExceeded { drain, stuck })
            }
        };

        shared.shutdown_pools().await;
        shared.subscribers.shutdown().await;
        result
    }
}

impl<P, K, R> Shared<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Gates applicable to `desc`, in the fixed acquisition order
    /// global → backend → handler. Unbounded dimensions are simply absent.
    pub(crate) fn gates_for(&self, desc: &HandlerDesc<P, K, R>) -> Vec<Arc<Gate>> {
        let mut gates = Vec::with_capacity(3);
        if let Some(gate) = &self.global_gate {
            gates.push(gate.clone());
        }
        match desc.backend() {
            crate::handlers::Backend::Cooperative => {}
            crate::handlers::Backend::Thread => gates.push(self.thread_gate.clone()),
            crate::handlers::Backend::Process => gates.push(self.process_gate.clone()),
        }
        if let Some(Some(gate)) = self.handler_gates.get(desc.id() as usize) {
            gates.push(gate.clone());
        }
        gates
    }

    /// The shared thread pool, started on first use.
    pub(crate) fn thread_pool(&self) -> Result<Arc<ThreadPool>, JobError> {
        let pool = self.thread_pool.get_or_init(|| {
            ThreadPool::start(self.cfg.thread_pool_size())
                .map(Arc::new)
                .map_err(|e| e.to_string())
        });
        pool.clone().map_err(|reason| JobError::Backend {
            reason: format!("thread pool failed to start: {reason}"),
        })
    }

    /// The shared worker-process pool (workers spawn on demand).
    pub(crate) fn process_pool(&self) -> &ProcessPool {
        &self.process_pool
    }

    async fn shutdown_pools(&self) {
        if let Some(Ok(pool)) = self.thread_pool.get() {
            pool.close();
            let pool = pool.clone();
            let join = tokio::task::spawn_blocking(move || pool.join_workers());
            // A thread still running abandoned work keeps its handle past
            // the deadline; the detached join reaps it eventually.
            let _ = tokio::time::timeout(self.cfg.drain, join).await;
        }
        self.process_pool.shutdown(self.cfg.drain).await;
    }
}
