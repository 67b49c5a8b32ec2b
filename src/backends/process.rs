//! # Worker-process pool for process-backend handlers.
//!
//! Workers are the current executable re-spawned with the
//! `SWITCHBOARD_WORKER` environment marker. The embedding binary opts in by
//! calling [`run_if_worker`] early in `main`: in the parent it is a no-op, in
//! a worker it serves requests and never returns. Parent and worker must
//! build the same registry (same registration order), since handlers travel
//! the wire by registration id.
//!
//! ## Architecture
//! ```text
//! JobActor ──checkout()──► Worker (child process)
//!    │        RUN frame ──► stdin ──► worker loop ──► ProcessRoutine::run
//!    │        response ◄── stdout ◄──┘
//!    ├─ success / handler error ──► check_in(worker)   (worker reused)
//!    └─ cancel / timeout / IO err ─► discard(worker)   (worker killed)
//! ```
//!
//! ## Rules
//! - Workers are spawned on demand; the process admission gate bounds how
//!   many are ever leased at once.
//! - A canceled or timed-out job kills its worker rather than waiting the
//!   work out; a fresh worker is spawned on next demand.
//! - `shutdown` sends idle workers a SHUTDOWN frame and force-kills whatever
//!   outlives the grace window.

use std::hash::Hash;
use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{panic_message, JobError};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerCall;
use crate::registry::Registry;

use super::ipc::{self, Request, Response};

/// Environment marker that turns the current executable into a pool worker.
pub(crate) const WORKER_ENV: &str = "SWITCHBOARD_WORKER";

/// One leased worker process.
pub(crate) struct Worker {
    id: u32,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Pool of reusable worker processes.
pub(crate) struct ProcessPool {
    bus: Bus,
    idle: Mutex<Vec<Worker>>,
    closed: AtomicBool,
    worker_seq: AtomicU32,
}

impl ProcessPool {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            bus,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            worker_seq: AtomicU32::new(0),
        }
    }

    /// Leases a worker: reuses an idle one or spawns a fresh process.
    pub(crate) fn checkout(&self) -> Result<Worker, JobError> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(JobError::Backend {
                reason: "process pool closed".to_string(),
            });
        }
        if let Some(worker) = self.lock_idle().pop() {
            return Ok(worker);
        }
        self.spawn_worker()
    }

    /// Runs one request on the leased worker.
    ///
    /// An `Err` means the worker itself is unreliable (transport failure);
    /// the caller must [`discard`](ProcessPool::discard) it. Handler-level
    /// failures come back as a normal [`Response`].
    pub(crate) async fn call(
        &self,
        worker: &mut Worker,
        handler: u32,
        payload: Vec<u8>,
    ) -> Result<Response, JobError> {
        ipc::write_request(&mut worker.stdin, &Request::Run { handler, payload })
            .await
            .map_err(|e| transport(worker.id, "write", e))?;
        ipc::read_response(&mut worker.stdout)
            .await
            .map_err(|e| transport(worker.id, "read", e))
    }

    /// Returns a healthy worker to the idle set.
    pub(crate) fn check_in(&self, worker: Worker) {
        if self.closed.load(AtomicOrdering::Acquire) {
            self.discard(worker);
            return;
        }
        self.lock_idle().push(worker);
    }

    /// Kills a worker whose in-flight work was abandoned (cancel, timeout,
    /// transport failure) and reaps it in the background.
    pub(crate) fn discard(&self, mut worker: Worker) {
        self.bus.publish(
            Event::now(EventKind::WorkerExited)
                .with_handler(worker_label(worker.id))
                .with_error("killed"),
        );
        tokio::spawn(async move {
            let _ = worker.child.start_kill();
            let _ = worker.child.wait().await;
        });
    }

    /// Shuts the pool down: polite SHUTDOWN frames first, force-kill after
    /// `grace`.
    pub(crate) async fn shutdown(&self, grace: Duration) {
        self.closed.store(true, AtomicOrdering::Release);
        let workers: Vec<Worker> = self.lock_idle().drain(..).collect();

        let goodbyes = workers.into_iter().map(|mut worker| {
            let bus = self.bus.clone();
            async move {
                let polite = ipc::write_request(&mut worker.stdin, &Request::Shutdown).await;
                let exited = match polite {
                    Ok(()) => tokio::time::timeout(grace, worker.child.wait()).await.is_ok(),
                    Err(_) => false,
                };
                if !exited {
                    let _ = worker.child.start_kill();
                    let _ = worker.child.wait().await;
                }
                bus.publish(
                    Event::now(EventKind::WorkerExited).with_handler(worker_label(worker.id)),
                );
            }
        });
        futures::future::join_all(goodbyes).await;
    }

    fn spawn_worker(&self) -> Result<Worker, JobError> {
        let exe = std::env::current_exe().map_err(|e| JobError::Backend {
            reason: format!("cannot locate current executable: {e}"),
        })?;
        let mut child = Command::new(exe)
            .env(WORKER_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::Backend {
                reason: format!("failed to spawn worker process: {e}"),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| JobError::Backend {
            reason: "worker stdin unavailable".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| JobError::Backend {
            reason: "worker stdout unavailable".to_string(),
        })?;

        let id = self.worker_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.bus
            .publish(Event::now(EventKind::WorkerSpawned).with_handler(worker_label(id)));

        Ok(Worker {
            id,
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn worker_label(id: u32) -> String {
    format!("worker-{id}")
}

fn transport(worker: u32, op: &str, e: io::Error) -> JobError {
    JobError::Backend {
        reason: format!("worker-{worker} {op} failed: {e}"),
    }
}

/// # Serve pool requests if this process was spawned as a worker.
///
/// Call early in `main`, after building the registry and before starting any
/// executor. In the parent process this returns immediately; in a worker
/// (spawned by the pool with the `SWITCHBOARD_WORKER` marker) it serves RUN
/// frames until shutdown or EOF, then exits the process.
///
/// The worker resolves handlers by registration id, so the registry built
/// here must register the same handlers in the same order as the parent's.
pub fn run_if_worker<P, K, R>(registry: &Registry<P, K, R>)
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    if std::env::var_os(WORKER_ENV).is_none() {
        return;
    }
    let code = worker_loop(registry, &mut io::stdin().lock(), &mut io::stdout().lock());
    std::process::exit(code);
}

fn worker_loop<P, K, R>(
    registry: &Registry<P, K, R>,
    reader: &mut impl Read,
    writer: &mut impl Write,
) -> i32
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    loop {
        match ipc::read_request(reader) {
            Ok(Some(Request::Run { handler, payload })) => {
                let response = serve_one(registry, handler, &payload);
                if ipc::write_response(writer, &response).is_err() {
                    return 1;
                }
            }
            Ok(Some(Request::Shutdown)) | Ok(None) => return 0,
            Err(_) => return 1,
        }
    }
}

fn serve_one<P, K, R>(registry: &Registry<P, K, R>, handler: u32, payload: &[u8]) -> Response
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    let Some(desc) = registry.by_id(handler) else {
        return Response::Internal(format!("unknown handler id {handler}"));
    };
    let HandlerCall::Process(routine) = desc.call() else {
        return Response::Internal(format!("handler '{}' is not a process handler", desc.name()));
    };
    match panic::catch_unwind(AssertUnwindSafe(|| routine.run(payload))) {
        Ok(Ok(bytes)) => Response::Ok(bytes),
        Ok(Err(reason)) => Response::Err(reason),
        Err(payload) => Response::Err(format!("handler panicked: {}", panic_message(&payload))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::handlers::{HandlerSpec, ProcessRoutine};

    struct Doubler;

    impl ProcessRoutine<u32, u32> for Doubler {
        fn encode(&self, payload: u32) -> Result<Vec<u8>, JobError> {
            Ok(payload.to_le_bytes().to_vec())
        }

        fn run(&self, payload: &[u8]) -> Result<Vec<u8>, String> {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(payload);
            let n = u32::from_le_bytes(bytes);
            n.checked_mul(2)
                .map(|doubled| doubled.to_le_bytes().to_vec())
                .ok_or_else(|| "overflow".to_string())
        }

        fn decode(&self, bytes: Vec<u8>) -> Result<u32, JobError> {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes);
            Ok(u32::from_le_bytes(raw))
        }
    }

    fn registry() -> Registry<u32, &'static str, u32> {
        let registry = Registry::new();
        registry
            .add("double", HandlerSpec::process("double", Doubler))
            .unwrap();
        registry
    }

    #[test]
    fn serve_one_runs_routine() {
        let registry = registry();
        match serve_one(&registry, 0, &5u32.to_le_bytes()) {
            Response::Ok(bytes) => assert_eq!(bytes, 10u32.to_le_bytes().to_vec()),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn serve_one_reports_handler_error() {
        let registry = registry();
        match serve_one(&registry, 0, &u32::MAX.to_le_bytes()) {
            Response::Err(reason) => assert_eq!(reason, "overflow"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn serve_one_rejects_unknown_id() {
        let registry = registry();
        assert!(matches!(
            serve_one(&registry, 9, &[]),
            Response::Internal(_)
        ));
    }

    #[test]
    fn worker_loop_serves_until_shutdown() {
        let registry = registry();

        let mut input = Vec::new();
        futures::executor::block_on(async {
            ipc::write_request(
                &mut input,
                &Request::Run {
                    handler: 0,
                    payload: 4u32.to_le_bytes().to_vec(),
                },
            )
            .await
            .unwrap();
            ipc::write_request(&mut input, &Request::Shutdown).await.unwrap();
        });

        let mut output = Vec::new();
        let code = worker_loop(&registry, &mut Cursor::new(input), &mut output);
        assert_eq!(code, 0);

        let response =
            futures::executor::block_on(ipc::read_response(&mut Cursor::new(output))).unwrap();
        assert_eq!(response, Response::Ok(8u32.to_le_bytes().to_vec()));
    }
}
