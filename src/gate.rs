//! # Capacity gate: counting semaphore with priority-aware admission.
//!
//! A [`Gate`] hands out up to `cap` [`Permit`]s. When the gate is exhausted,
//! acquirers wait in a queue ordered by (priority descending, admission
//! sequence ascending), so higher-priority jobs are admitted first and equal
//! priorities are FIFO.
//!
//! ## Permit transfer
//! `release` does not blindly bump the available count: it pops the head
//! waiter and sends the [`Permit`] *itself* through the waiter's channel.
//! - If the waiter is gone (its job was canceled while queued), the send
//!   fails, the permit is defused and offered to the next waiter.
//! - If the send succeeds but the receiving future is dropped before it is
//!   polled, the permit is dropped inside the channel and its `Drop` releases
//!   it back to the gate.
//!
//! Either way permits are conserved: at any instant
//! `available + in-flight == cap`.
//!
//! ## Rules
//! - A canceled waiter costs O(1) amortized: it is skipped when woken.
//! - Unbounded caps are expressed by having *no* gate, not a huge one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

/// Queue position: (negated priority, admission sequence).
///
/// `BTreeMap` iterates ascending, so negating the priority puts the highest
/// priority first and the sequence number breaks ties FIFO.
type WaiterKey = (i16, u64);

/// Counting semaphore with a priority-ordered waiter queue.
pub(crate) struct Gate {
    cap: usize,
    state: Mutex<GateState>,
}

struct GateState {
    available: usize,
    waiters: BTreeMap<WaiterKey, oneshot::Sender<Permit>>,
}

impl Gate {
    /// Creates a gate with `cap` permits (`cap` must be > 0; unbounded caps
    /// omit the gate entirely).
    pub(crate) fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self {
            cap,
            state: Mutex::new(GateState {
                available: cap,
                waiters: BTreeMap::new(),
            }),
        })
    }

    /// Acquires one permit, waiting in priority order if the gate is full.
    ///
    /// Cancel-safe: dropping the returned future before completion either
    /// leaves a dead waiter (skipped on wake) or returns the in-flight permit
    /// to the gate.
    pub(crate) async fn acquire(self: &Arc<Self>, priority: i8, seq: u64) -> Permit {
        let rx = {
            let mut s = self.lock();
            if s.available > 0 {
                s.available -= 1;
                return Permit::new(self.clone());
            }
            let (tx, rx) = oneshot::channel();
            s.waiters.insert((-(priority as i16), seq), tx);
            rx
        };
        // The sender lives in the gate state; it is dropped without sending
        // only if the gate itself is dropped, which the Arc we hold forbids.
        rx.await.expect("gate dropped while waiting")
    }

    /// Returns one permit: hands it to the head waiter, or back to the pool.
    fn release(self: &Arc<Self>) {
        let mut s = self.lock();
        loop {
            match s.waiters.pop_first() {
                Some((_, tx)) => match tx.send(Permit::new(self.clone())) {
                    Ok(()) => return,
                    // Dead waiter: defuse so the returned permit does not
                    // re-enter release, then offer to the next one.
                    Err(mut dead) => dead.defuse(),
                },
                None => {
                    debug_assert!(s.available < self.cap);
                    s.available += 1;
                    return;
                }
            }
        }
    }

    /// Permits currently unheld.
    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.lock().available
    }

    /// Waiter entries currently queued (dead ones included until popped).
    #[cfg(test)]
    pub(crate) fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        // Queue operations cannot panic, so the mutex cannot be poisoned.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One unit of gate capacity; releasing is dropping.
pub(crate) struct Permit {
    gate: Option<Arc<Gate>>,
}

impl Permit {
    fn new(gate: Arc<Gate>) -> Self {
        Self { gate: Some(gate) }
    }

    /// Detaches the permit from its gate so dropping it releases nothing.
    fn defuse(&mut self) {
        self.gate = None;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn fast_path_and_conservation() {
        let gate = Gate::new(2);
        let a = gate.acquire(0, 1).await;
        let b = gate.acquire(0, 2).await;
        assert_eq!(gate.available(), 0);

        drop(a);
        assert_eq!(gate.available(), 1);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn waiters_wake_in_priority_then_fifo_order() {
        let gate = Gate::new(1);
        let held = gate.acquire(0, 0).await;

        let mut waiters = tokio::task::JoinSet::new();
        for (priority, seq) in [(0i8, 1u64), (5, 2), (5, 3), (1, 4)] {
            let gate = gate.clone();
            waiters.spawn(async move {
                let permit = gate.acquire(priority, seq).await;
                drop(permit);
                seq
            });
        }

        // Let every waiter enqueue before releasing.
        while gate.waiting() < 4 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        drop(held);

        let mut order = Vec::new();
        while let Some(res) = waiters.join_next().await {
            order.push(res.unwrap());
        }
        // Priority 5 first (FIFO among equals), then 1, then 0.
        assert_eq!(order, vec![2, 3, 4, 1]);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn dead_waiters_are_skipped() {
        let gate = Gate::new(1);
        let held = gate.acquire(0, 0).await;

        // Enqueue a waiter, then drop it before it can be woken.
        let dead = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.acquire(9, 1).await;
            })
        };
        while gate.waiting() < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        dead.abort();
        let _ = dead.await;

        let live = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire(0, 2).await })
        };
        while gate.waiting() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        drop(held);
        let permit = live.await.unwrap();
        drop(permit);
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.waiting(), 0);
    }
}
