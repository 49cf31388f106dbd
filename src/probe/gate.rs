//! Resolve-once completion gate.

use std::sync::OnceLock;

use tokio::sync::Notify;

/// Holds the first value offered to it and ignores the rest.
///
/// Several activities may race to [`resolve`](Self::resolve); exactly one
/// wins. A single waiter blocks in [`wait`](Self::wait) until that happens.
#[derive(Debug)]
pub struct CompletionGate<T> {
    value: OnceLock<T>,
    notify: Notify,
}

impl<T> Default for CompletionGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionGate<T> {
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            notify: Notify::new(),
        }
    }

    /// Record `value` unless the gate is already resolved.
    ///
    /// Returns `true` for the call that won. Later calls are no-ops.
    pub fn resolve(&self, value: T) -> bool {
        if self.value.set(value).is_err() {
            return false;
        }
        // notify_one stores a permit if the waiter isn't parked yet
        self.notify.notify_one();
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// The recorded value, if any.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Wait until the gate is resolved. Meant for a single waiter.
    pub async fn wait(&self) -> &T {
        loop {
            if let Some(value) = self.value.get() {
                return value;
            }
            self.notify.notified().await;
        }
    }
}
