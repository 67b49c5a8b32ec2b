//! # JobActor: one (adapter, handler) pair from admission to notification.
//!
//! ## Lifecycle
//! ```text
//! spawn ──► PENDING: acquire gates (global → backend → handler, cancellable)
//!             │
//!             ├─ admission token canceled ──► CANCELED (on_cancel, WhileQueued)
//!             ▼
//!           ADMITTED ──► RUNNING: materialize payload, dispatch to backend
//!             │             ├─ result        ──► SUCCEEDED (on_success)
//!             │             ├─ handler error ──► FAILED    (on_failure)
//!             │             ├─ timeout       ──► FAILED    (on_failure, Timeout)
//!             │             └─ hard cancel   ──► CANCELED  (on_cancel, WhileRunning)
//!             ▼
//!           release permits (reverse order) ──► exactly one notification
//! ```
//!
//! ## Rules
//! - Permits are released before the notification fires.
//! - Exactly one of `on_success` / `on_failure` / `on_cancel` runs, once.
//! - A notification error or panic is contained: published as `NotifyFailed`
//!   and handed to the `on_notify_error` hook, never to another job.
//! - Thread and process work cannot be interrupted mid-flight: cancellation
//!   abandons it (thread) or kills the worker (process) and the job settles
//!   immediately.

use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterRef;
use crate::backends::ipc::Response;
use crate::error::{panic_message, Cancellation, JobError, NotifyError};
use crate::events::{Event, EventKind};
use crate::gate::Permit;
use crate::handlers::{HandlerCall, HandlerDesc};

use super::executor::Shared;

/// How a dispatch race ended.
enum Raced<T> {
    Done(T),
    TimedOut(Duration),
    Canceled,
}

/// Terminal result of a job.
enum Outcome<R> {
    Succeeded(R),
    Failed(JobError),
    Canceled(Cancellation),
}

pub(crate) struct JobActor<P, K, R> {
    id: u64,
    adapter: AdapterRef<P, K, R>,
    desc: Arc<HandlerDesc<P, K, R>>,
    shared: Arc<Shared<P, K, R>>,
    token: CancellationToken,
    admitted_tx: Option<oneshot::Sender<()>>,
    done_tx: Option<oneshot::Sender<()>>,
}

impl<P, K, R> JobActor<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(
        id: u64,
        adapter: AdapterRef<P, K, R>,
        desc: Arc<HandlerDesc<P, K, R>>,
        shared: Arc<Shared<P, K, R>>,
        token: CancellationToken,
        admitted_tx: oneshot::Sender<()>,
        done_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            adapter,
            desc,
            shared,
            token,
            admitted_tx: Some(admitted_tx),
            done_tx: Some(done_tx),
        }
    }

    pub(crate) async fn run(mut self) {
        self.publish(EventKind::JobQueued);

        let gates = self.shared.gates_for(&self.desc);
        let mut permits: Vec<Permit> = Vec::with_capacity(gates.len());
        for gate in &gates {
            let permit = tokio::select! {
                biased;
                _ = self.shared.admission_token.cancelled() => None,
                permit = gate.acquire(self.desc.priority(), self.id) => Some(permit),
            };
            match permit {
                Some(permit) => permits.push(permit),
                None => {
                    Self::release(&mut permits);
                    self.finish(Outcome::Canceled(Cancellation::WhileQueued)).await;
                    return;
                }
            }
        }

        if let Some(tx) = self.admitted_tx.take() {
            let _ = tx.send(());
        }
        self.publish(EventKind::JobAdmitted);

        let label = format!("{}#{}", self.desc.name(), self.id);
        self.shared.active.insert(self.id, label);
        self.publish(EventKind::JobStarting);

        // Cooperative handler bodies (and payload materialization) run on
        // this task; a panic there must still settle the job with exactly
        // one notification.
        let outcome = match AssertUnwindSafe(self.dispatch()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Outcome::Failed(JobError::Handler {
                reason: format!("handler panicked: {}", panic_message(&*payload)),
            }),
        };

        self.shared.active.remove(self.id);
        Self::release(&mut permits);
        self.finish(outcome).await;
    }

    /// Releases permits in reverse acquisition order.
    fn release(permits: &mut Vec<Permit>) {
        while let Some(permit) = permits.pop() {
            drop(permit);
        }
    }

    async fn dispatch(&self) -> Outcome<R> {
        // Payload materialization is a suspension point; cancellation here
        // settles the job without invoking the handler.
        let payload = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            res = self.adapter.payload() => Some(res),
        };
        let payload = match payload {
            Some(Ok(payload)) => payload,
            Some(Err(e)) => return Outcome::Failed(e),
            None => return Outcome::Canceled(Cancellation::WhileRunning),
        };

        match self.desc.call() {
            HandlerCall::Cooperative(f) => {
                let fut = f(payload);
                match self.race(fut).await {
                    Raced::Done(Ok(result)) => Outcome::Succeeded(result),
                    Raced::Done(Err(e)) => Outcome::Failed(e),
                    Raced::TimedOut(dur) => self.timed_out(dur),
                    Raced::Canceled => Outcome::Canceled(Cancellation::WhileRunning),
                }
            }
            HandlerCall::Thread(f) => {
                let pool = match self.shared.thread_pool() {
                    Ok(pool) => pool,
                    Err(e) => return Outcome::Failed(e),
                };
                let (tx, rx) = oneshot::channel();
                let f = f.clone();
                let submitted = pool.submit(Box::new(move || {
                    let _ = tx.send(f(payload));
                }));
                if let Err(e) = submitted {
                    return Outcome::Failed(e);
                }
                match self.race(rx).await {
                    Raced::Done(Ok(Ok(result))) => Outcome::Succeeded(result),
                    Raced::Done(Ok(Err(e))) => Outcome::Failed(e),
                    Raced::Done(Err(_recv)) => Outcome::Failed(JobError::Backend {
                        reason: "handler thread dropped its result (panicked?)".to_string(),
                    }),
                    Raced::TimedOut(dur) => self.timed_out(dur),
                    Raced::Canceled => Outcome::Canceled(Cancellation::WhileRunning),
                }
            }
            HandlerCall::Process(routine) => {
                let bytes = match routine.encode(payload) {
                    Ok(bytes) => bytes,
                    Err(e) => return Outcome::Failed(e),
                };
                let pool = self.shared.process_pool();
                let mut worker = match pool.checkout() {
                    Ok(worker) => worker,
                    Err(e) => return Outcome::Failed(e),
                };
                let raced = self.race(pool.call(&mut worker, self.desc.id(), bytes)).await;
                match raced {
                    Raced::Done(Ok(response)) => {
                        // The worker answered; it stays in rotation.
                        pool.check_in(worker);
                        match response {
                            Response::Ok(bytes) => match routine.decode(bytes) {
                                Ok(result) => Outcome::Succeeded(result),
                                Err(e) => Outcome::Failed(e),
                            },
                            Response::Err(reason) => Outcome::Failed(JobError::Handler { reason }),
                            Response::Internal(reason) => {
                                Outcome::Failed(JobError::Backend { reason })
                            }
                        }
                    }
                    Raced::Done(Err(transport)) => {
                        pool.discard(worker);
                        Outcome::Failed(transport)
                    }
                    Raced::TimedOut(dur) => {
                        pool.discard(worker);
                        self.timed_out(dur)
                    }
                    Raced::Canceled => {
                        pool.discard(worker);
                        Outcome::Canceled(Cancellation::WhileRunning)
                    }
                }
            }
        }
    }

    /// Races a completion future against the job token and timeout.
    async fn race<F, T>(&self, fut: F) -> Raced<T>
    where
        F: std::future::Future<Output = T>,
    {
        match self.desc.timeout() {
            Some(dur) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Raced::Canceled,
                res = tokio::time::timeout(dur, fut) => match res {
                    Ok(value) => Raced::Done(value),
                    Err(_elapsed) => Raced::TimedOut(dur),
                }
            },
            None => tokio::select! {
                biased;
                _ = self.token.cancelled() => Raced::Canceled,
                value = fut => Raced::Done(value),
            },
        }
    }

    fn timed_out(&self, dur: Duration) -> Outcome<R> {
        self.shared.bus.publish(
            Event::now(EventKind::TimeoutHit)
                .with_job(self.id)
                .with_handler(self.desc.name())
                .with_timeout(dur),
        );
        Outcome::Failed(JobError::Timeout { timeout: dur })
    }

    /// Publishes the terminal event and delivers exactly one notification.
    async fn finish(mut self, outcome: Outcome<R>) {
        let notified = match outcome {
            Outcome::Succeeded(result) => {
                self.publish(EventKind::JobSucceeded);
                self.guard(self.adapter.on_success(result)).await
            }
            Outcome::Failed(error) => {
                self.shared.bus.publish(
                    Event::now(EventKind::JobFailed)
                        .with_job(self.id)
                        .with_handler(self.desc.name())
                        .with_error(error.to_string()),
                );
                self.guard(self.adapter.on_failure(error)).await
            }
            Outcome::Canceled(cancellation) => {
                self.publish(EventKind::JobCanceled);
                self.guard(self.adapter.on_cancel(cancellation)).await
            }
        };

        if let Err(error) = notified {
            self.shared.bus.publish(
                Event::now(EventKind::NotifyFailed)
                    .with_job(self.id)
                    .with_handler(self.desc.name())
                    .with_error(&*error.reason),
            );
            if let Some(hook) = &self.shared.notify_hook {
                hook(&error);
            }
        }

        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Contains notification errors and panics.
    async fn guard<F>(&self, fut: F) -> Result<(), NotifyError>
    where
        F: std::future::Future<Output = Result<(), NotifyError>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => Err(NotifyError {
                reason: format!("notification panicked: {}", panic_message(&*payload)),
            }),
        }
    }

    fn publish(&self, kind: EventKind) {
        self.shared.bus.publish(
            Event::now(kind)
                .with_job(self.id)
                .with_handler(self.desc.name()),
        );
    }
}
