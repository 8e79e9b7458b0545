//! In-flight invocations keyed by invoke id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Resolvers for outstanding calls. One stable listener per reply event
/// looks the invoke id up here instead of registering a listener per call.
pub(crate) struct PendingCalls<T> {
    calls: Arc<Mutex<HashMap<String, T>>>,
}

impl<T> Clone for PendingCalls<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> Default for PendingCalls<T> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> PendingCalls<T> {
    pub fn insert(&self, invoke_id: String, resolver: T) {
        self.lock().insert(invoke_id, resolver);
    }

    /// Claim the resolver for an id. Only the first reply gets it.
    pub fn take(&self, invoke_id: &str) -> Option<T> {
        self.lock().remove(invoke_id)
    }

    pub fn with<R>(&self, invoke_id: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().get(invoke_id).map(f)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Remove and return every outstanding resolver.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain().map(|(_, resolver)| resolver).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, T>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a pending entry when the call it belongs to is dropped.
pub(crate) struct PendingGuard<T> {
    pending: PendingCalls<T>,
    invoke_id: String,
}

impl<T> PendingGuard<T> {
    pub fn new(pending: PendingCalls<T>, invoke_id: String) -> Self {
        Self { pending, invoke_id }
    }
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        self.pending.take(&self.invoke_id);
    }
}
