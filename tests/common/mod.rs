//! Shared test fixtures: a little arithmetic message type.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use switchboard::{Adapter, Cancellation, JobError, NotifyError};

/// Terminal notification observed by a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ok(f64),
    Failed(String),
    Canceled(Cancellation),
}

/// Shared log of handler completions, used to assert cross-message ordering.
pub type OrderLog = Arc<Mutex<Vec<&'static str>>>;

/// An arithmetic request: `left <op> right`.
pub struct Message {
    pub left: i64,
    pub op: &'static str,
    pub right: i64,
    calls: Mutex<Vec<Call>>,
    order: Option<OrderLog>,
}

impl Message {
    pub fn new(left: i64, op: &'static str, right: i64) -> Arc<Self> {
        Arc::new(Self {
            left,
            op,
            right,
            calls: Mutex::new(Vec::new()),
            order: None,
        })
    }

    pub fn with_order_log(left: i64, op: &'static str, right: i64, order: OrderLog) -> Arc<Self> {
        Arc::new(Self {
            left,
            op,
            right,
            calls: Mutex::new(Vec::new()),
            order: Some(order),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        if let Some(order) = &self.order {
            order.lock().unwrap().push(self.op);
        }
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Adapter<(i64, i64), &'static str, f64> for Message {
    fn keys(&self) -> Result<Vec<&'static str>, JobError> {
        Ok(vec![self.op])
    }

    async fn payload(&self) -> Result<(i64, i64), JobError> {
        Ok((self.left, self.right))
    }

    async fn on_success(&self, result: f64) -> Result<(), NotifyError> {
        self.record(Call::Ok(result));
        Ok(())
    }

    async fn on_failure(&self, error: JobError) -> Result<(), NotifyError> {
        self.record(Call::Failed(error.as_label().to_string()));
        Ok(())
    }

    async fn on_cancel(&self, cancellation: Cancellation) -> Result<(), NotifyError> {
        self.record(Call::Canceled(cancellation));
        Ok(())
    }
}
