//! # Builder for constructing an [`Executor`] with optional features.

use std::hash::Hash;
use std::sync::Arc;

use crate::config::Config;
use crate::error::NotifyError;
use crate::registry::Registry;
use crate::subscribers::Subscribe;

use super::executor::{Executor, NotifyHook};

/// Builder returned by [`Executor::builder`].
pub struct ExecutorBuilder<P, K, R> {
    registry: Arc<Registry<P, K, R>>,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    notify_hook: Option<NotifyHook>,
}

impl<P, K, R> ExecutorBuilder<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(registry: Arc<Registry<P, K, R>>) -> Self {
        Self {
            registry,
            cfg: Config::default(),
            subscribers: Vec::new(),
            notify_hook: None,
        }
    }

    /// Replaces the default [`Config`].
    pub fn config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (job lifecycle, shutdown, pool
    /// activity) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Installs a hook receiving notification-callback failures.
    ///
    /// Without a hook such failures are still published on the event bus as
    /// `NotifyFailed`.
    pub fn on_notify_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&NotifyError) + Send + Sync + 'static,
    {
        self.notify_hook = Some(Arc::new(hook));
        self
    }

    /// Builds the executor. It does not run until
    /// [`start`](Executor::start) or [`scope`](Executor::scope).
    pub fn build(self) -> Executor<P, K, R> {
        Executor {
            registry: self.registry,
            cfg: self.cfg,
            subscribers: self.subscribers,
            notify_hook: self.notify_hook,
        }
    }
}
