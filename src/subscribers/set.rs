//! # Subscriber fan-out: router, per-subscriber queues, worker isolation.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};

use super::subscribe::Subscribe;

/// Owns the router and one worker task per subscriber.
pub(crate) struct SubscriberSet {
    close: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriberSet {
    /// Subscribes to the bus and spawns the delivery pipeline.
    pub(crate) fn start(subscribers: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let close = CancellationToken::new();
        let mut tasks = Vec::with_capacity(subscribers.len() + 1);
        let mut queues = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let (tx, rx) = mpsc::channel(subscriber.queue_capacity().max(1));
            queues.push((tx, subscriber.name()));
            tasks.push(tokio::spawn(worker_loop(subscriber, rx, bus.clone())));
        }

        let rx = bus.subscribe();
        tasks.push(tokio::spawn(route_loop(bus, rx, queues, close.clone())));

        Self {
            close,
            tasks: Mutex::new(tasks),
        }
    }

    /// Flushes buffered events and joins the pipeline tasks.
    pub(crate) async fn shutdown(&self) {
        self.close.cancel();
        let tasks: Vec<_> = self.lock_tasks().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn route_loop(
    bus: Bus,
    mut rx: broadcast::Receiver<Event>,
    queues: Vec<(mpsc::Sender<Event>, &'static str)>,
    close: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = close.cancelled() => break,
            res = rx.recv() => match res {
                Ok(ev) => fan_out(&bus, &queues, ev),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
    // Deliver what the ring already buffered before the queues close.
    while let Ok(ev) = rx.try_recv() {
        fan_out(&bus, &queues, ev);
    }
}

fn fan_out(bus: &Bus, queues: &[(mpsc::Sender<Event>, &'static str)], ev: Event) {
    for (tx, name) in queues {
        if tx.try_send(ev.clone()).is_err() && ev.kind != EventKind::SubscriberOverflow {
            bus.publish(Event::now(EventKind::SubscriberOverflow).with_handler(*name));
        }
    }
}

async fn worker_loop(subscriber: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Event>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let kind = ev.kind;
        let delivered = AssertUnwindSafe(subscriber.on_event(&ev)).catch_unwind().await;
        if delivered.is_err() && kind != EventKind::SubscriberPanicked {
            bus.publish(Event::now(EventKind::SubscriberPanicked).with_handler(subscriber.name()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, AtomicOrdering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Grenade;

    #[async_trait]
    impl Subscribe for Grenade {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "grenade"
        }
    }

    #[tokio::test]
    async fn delivers_events_and_flushes_on_shutdown() {
        let bus = Bus::new(64);
        let counter = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let set = SubscriberSet::start(vec![counter.clone()], bus.clone());

        for _ in 0..5 {
            bus.publish(Event::now(EventKind::JobQueued));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        set.shutdown().await;

        assert_eq!(counter.seen.load(AtomicOrdering::SeqCst), 5);
    }

    #[tokio::test]
    async fn panicking_subscriber_is_isolated() {
        let bus = Bus::new(64);
        let counter = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let set = SubscriberSet::start(vec![Arc::new(Grenade), counter.clone()], bus.clone());

        bus.publish(Event::now(EventKind::JobQueued));
        tokio::time::sleep(Duration::from_millis(20)).await;
        set.shutdown().await;

        // The counter saw the original event plus the panic report.
        assert!(counter.seen.load(AtomicOrdering::SeqCst) >= 2);
    }
}
