//! Process-backend end-to-end scenarios.
//!
//! Built with `harness = false`: the pool spawns the current executable as
//! its worker, so `main` calls [`switchboard::run_if_worker`] before running
//! any assertions. Parent and worker therefore share one registry-building
//! function, which keeps handler ids identical on both sides of the wire.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use switchboard::{
    Cancellation, Config, Executor, HandlerSpec, JobError, ProcessRoutine, Registry, RuntimeError,
    WaitFor,
};

use common::{Call, Message, OrderLog};

type ArithRegistry = Registry<(i64, i64), &'static str, f64>;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Integer pair in, f64 out, little-endian on the wire.
struct DivRoutine;

impl ProcessRoutine<(i64, i64), f64> for DivRoutine {
    fn encode(&self, (a, b): (i64, i64)) -> Result<Vec<u8>, JobError> {
        let mut bytes = Vec::with_capacity(16);
        bytes.extend_from_slice(&a.to_le_bytes());
        bytes.extend_from_slice(&b.to_le_bytes());
        Ok(bytes)
    }

    fn run(&self, payload: &[u8]) -> Result<Vec<u8>, String> {
        if payload.len() != 16 {
            return Err(format!("expected 16 payload bytes, got {}", payload.len()));
        }
        let (a, b) = (
            i64::from_le_bytes(payload[..8].try_into().unwrap()),
            i64::from_le_bytes(payload[8..].try_into().unwrap()),
        );
        if b == 0 {
            return Err("division by zero".to_string());
        }
        Ok((a as f64 / b as f64).to_le_bytes().to_vec())
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<f64, JobError> {
        let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| JobError::Backend {
            reason: format!("expected 8 result bytes, got {}", bytes.len()),
        })?;
        Ok(f64::from_le_bytes(raw))
    }
}

/// Burns ten seconds in the worker; used for timeout and cancel scenarios.
struct SleepyRoutine;

impl ProcessRoutine<(i64, i64), f64> for SleepyRoutine {
    fn encode(&self, _payload: (i64, i64)) -> Result<Vec<u8>, JobError> {
        Ok(vec![0])
    }

    fn run(&self, _payload: &[u8]) -> Result<Vec<u8>, String> {
        std::thread::sleep(Duration::from_secs(10));
        Ok(0.0f64.to_le_bytes().to_vec())
    }

    fn decode(&self, _bytes: Vec<u8>) -> Result<f64, JobError> {
        Ok(0.0)
    }
}

fn build_registry() -> Arc<ArithRegistry> {
    let registry = Arc::new(Registry::new());
    registry
        .add(
            "+",
            HandlerSpec::cooperative("add", |(a, b): (i64, i64)| async move {
                Ok((a + b) as f64)
            }),
        )
        .unwrap();
    registry
        .add(
            "-",
            HandlerSpec::cooperative("sub", |(a, b): (i64, i64)| async move {
                tokio::time::sleep(ms(400)).await;
                Ok((a - b) as f64)
            }),
        )
        .unwrap();
    registry
        .add("/", HandlerSpec::process("div", DivRoutine))
        .unwrap();
    registry
        .add("sleepy", HandlerSpec::process("sleepy", SleepyRoutine))
        .unwrap();
    registry
        .add(
            "sleepy-timed",
            HandlerSpec::process("sleepy-timed", SleepyRoutine).with_timeout(ms(100)),
        )
        .unwrap();
    registry
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = build_registry();
    // In a pool worker this serves frames and never returns.
    switchboard::run_if_worker(&registry);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        fan_in_across_backends(registry.clone()).await;
        println!("process_backend::fan_in_across_backends ... ok");

        process_timeout_fails_the_job(registry.clone()).await;
        println!("process_backend::process_timeout_fails_the_job ... ok");

        cancel_kills_the_leased_worker(registry.clone()).await;
        println!("process_backend::cancel_kills_the_leased_worker ... ok");
    });
    Ok(())
}

async fn fan_in_across_backends(registry: Arc<ArithRegistry>) {
    let order: OrderLog = Arc::new(Mutex::new(Vec::new()));
    let messages = [
        Message::with_order_log(3, "-", 2, order.clone()),
        Message::with_order_log(4, "+", 5, order.clone()),
        Message::with_order_log(3, "/", 2, order.clone()),
        Message::with_order_log(3, "/", 0, order.clone()),
        Message::with_order_log(3, "+", 0, order.clone()),
    ];

    let handle = Executor::builder(registry).build().start();
    for msg in &messages {
        handle.schedule(msg.clone()).unwrap();
    }
    handle.stop().await.unwrap();

    assert_eq!(messages[0].calls(), vec![Call::Ok(1.0)]);
    assert_eq!(messages[1].calls(), vec![Call::Ok(9.0)]);
    assert_eq!(messages[2].calls(), vec![Call::Ok(1.5)]);
    assert_eq!(
        messages[3].calls(),
        vec![Call::Failed("job_handler_failed".to_string())]
    );
    assert_eq!(messages[4].calls(), vec![Call::Ok(3.0)]);
    assert_eq!(order.lock().unwrap().last(), Some(&"-"));
}

async fn process_timeout_fails_the_job(registry: Arc<ArithRegistry>) {
    let handle = Executor::builder(registry).build().start();
    let msg = Message::new(0, "sleepy-timed", 0);

    let started = Instant::now();
    handle
        .execute(msg.clone(), WaitFor::Completion(ms(5000)))
        .await
        .unwrap();
    let elapsed = started.elapsed();
    handle.stop().await.unwrap();

    assert!(elapsed < ms(2000), "timeout should fire early: {elapsed:?}");
    assert_eq!(msg.calls(), vec![Call::Failed("job_timeout".to_string())]);
}

async fn cancel_kills_the_leased_worker(registry: Arc<ArithRegistry>) {
    let cfg = Config {
        drain: ms(200),
        ..Config::default()
    };
    let handle = Executor::builder(registry).config(cfg).build().start();

    let msg = Message::new(0, "sleepy", 0);
    handle.execute(msg.clone(), WaitFor::Admission).await.unwrap();
    tokio::time::sleep(ms(100)).await;

    let started = Instant::now();
    let err = handle.stop().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, RuntimeError::DrainExceeded { .. }));
    assert!(elapsed < ms(5000), "stop must not wait the worker out: {elapsed:?}");
    assert_eq!(msg.calls(), vec![Call::Canceled(Cancellation::WhileRunning)]);
}
