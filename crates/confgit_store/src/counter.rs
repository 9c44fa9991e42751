//! Distributed counter boundary.
//!
//! The store never interprets the counter's value; it only reacts to
//! "the value changed", which peers use to signal that the shared remote
//! has new content.

use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked with the new value on every counter change.
pub type CounterListener = Arc<dyn Fn(i64) + Send + Sync>;

/// An externally maintained shared integer with change subscription.
pub trait SharedCounter: Send + Sync {
    /// The current value.
    fn value(&self) -> i64;

    /// Registers a change listener.
    fn subscribe(&self, listener: CounterListener);
}

/// An in-process counter for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryCounter {
    value: Mutex<i64>,
    listeners: Mutex<Vec<CounterListener>>,
}

impl MemoryCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value and notifies listeners on the calling thread.
    pub fn set(&self, value: i64) {
        *self.value.lock() = value;
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(value);
        }
    }

    /// Increments the value and notifies listeners.
    pub fn increment(&self) {
        let value = {
            let mut guard = self.value.lock();
            *guard += 1;
            *guard
        };
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(value);
        }
    }
}

impl SharedCounter for MemoryCounter {
    fn value(&self) -> i64 {
        *self.value.lock()
    }

    fn subscribe(&self, listener: CounterListener) {
        self.listeners.lock().push(listener);
    }
}
