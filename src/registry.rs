//! # Routing table: key → ordered handler descriptors.
//!
//! The [`Registry`] is populated before execution and sealed by the first
//! executor built on it. After sealing it is read-only; registration attempts
//! fail with [`RuntimeError::AlreadyRunning`].
//!
//! ## Rules
//! - Registration order is preserved per key; lookup is deterministic.
//! - A key may carry multiple handlers; a message routing to that key fans
//!   out into one job per handler.
//! - Handler ids are global registration order and identify process routines
//!   on the worker wire.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::RuntimeError;
use crate::handlers::{HandlerDesc, HandlerSpec};

/// Mapping from routing keys to registered handlers.
///
/// Shared with executors (and worker processes) behind an `Arc`.
pub struct Registry<P, K, R> {
    inner: Mutex<Inner<P, K, R>>,
    sealed: AtomicBool,
}

struct Inner<P, K, R> {
    by_key: HashMap<K, Vec<Arc<HandlerDesc<P, K, R>>>>,
    // Registration order; index == handler id.
    all: Vec<Arc<HandlerDesc<P, K, R>>>,
}

impl<P, K, R> Registry<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_key: HashMap::new(),
                all: Vec::new(),
            }),
            sealed: AtomicBool::new(false),
        }
    }

    /// Registers `spec` under `key`, appending to the key's handler list.
    ///
    /// Fails with [`RuntimeError::AlreadyRunning`] once an executor has been
    /// started on this registry.
    pub fn add(&self, key: K, spec: HandlerSpec<P, R>) -> Result<(), RuntimeError> {
        let mut inner = self.lock();
        if self.sealed.load(AtomicOrdering::Acquire) {
            return Err(RuntimeError::AlreadyRunning {
                handler: spec.name().to_string(),
            });
        }

        let id = inner.all.len() as u32;
        let (name, call, priority, max_concurrent, timeout) = spec.into_parts();
        let desc = HandlerDesc::new(id, key.clone(), name, call, priority, max_concurrent, timeout);

        inner.all.push(desc.clone());
        inner.by_key.entry(key).or_default().push(desc);
        Ok(())
    }

    /// Returns the handlers registered under `key`, in registration order.
    ///
    /// Unknown keys yield an empty vector.
    pub fn handlers_for(&self, key: &K) -> Vec<Arc<HandlerDesc<P, K, R>>> {
        self.lock().by_key.get(key).cloned().unwrap_or_default()
    }

    /// Number of registered handlers across all keys.
    pub fn len(&self) -> usize {
        self.lock().all.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once an executor has sealed this registry.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn seal(&self) {
        // Taken under the registration lock so no `add` can slip past.
        let _inner = self.lock();
        self.sealed.store(true, AtomicOrdering::Release);
    }

    pub(crate) fn by_id(&self, id: u32) -> Option<Arc<HandlerDesc<P, K, R>>> {
        self.lock().all.get(id as usize).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<P, K, R>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<P, K, R> Default for Registry<P, K, R>
where
    P: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;

    fn add_spec(registry: &Registry<u32, &'static str, u32>, key: &'static str, name: &'static str) {
        registry
            .add(key, HandlerSpec::cooperative(name, |n: u32| async move { Ok(n) }))
            .unwrap();
    }

    #[test]
    fn lookup_preserves_registration_order() {
        let registry = Registry::new();
        add_spec(&registry, "a", "first");
        add_spec(&registry, "b", "other");
        add_spec(&registry, "a", "second");

        let names: Vec<_> = registry
            .handlers_for(&"a")
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(registry.handlers_for(&"missing").is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn ids_follow_global_registration_order() {
        let registry = Registry::new();
        add_spec(&registry, "a", "first");
        add_spec(&registry, "b", "second");

        assert_eq!(registry.by_id(0).unwrap().name(), "first");
        assert_eq!(registry.by_id(1).unwrap().name(), "second");
        assert!(registry.by_id(2).is_none());
    }

    #[test]
    fn sealed_registry_rejects_registration() {
        let registry = Registry::new();
        add_spec(&registry, "a", "first");
        registry.seal();

        let err = registry
            .add("b", HandlerSpec::cooperative("late", |n: u32| async move { Ok(n) }))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRunning { .. }));
        assert_eq!(err.as_label(), "runtime_already_running");
    }
}
