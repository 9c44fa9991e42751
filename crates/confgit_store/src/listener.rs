//! Store event listeners.
//!
//! The store emits two events: "stored content changed" (after any
//! successful pull or commit that altered content; the cache has already
//! been invalidated when it fires) and "remote URL changed". Listeners
//! receive them in registration order on the thread that performed the
//! operation.

use std::sync::Arc;

use parking_lot::RwLock;

/// Receiver of store events.
pub trait StoreListener: Send + Sync {
    /// Stored content changed; caches were invalidated.
    fn store_changed(&self) {}

    /// The remote repository URL changed.
    fn remote_url_changed(&self, _url: &str) {}
}

/// Holds registered listeners and fans events out to them.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn StoreListener>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn add(&self, listener: Arc<dyn StoreListener>) {
        self.listeners.write().push(listener);
    }

    /// Notifies all listeners of a content change.
    pub fn notify_store_changed(&self) {
        for listener in self.listeners.read().iter() {
            listener.store_changed();
        }
    }

    /// Notifies all listeners of a remote URL change.
    pub fn notify_remote_url_changed(&self, url: &str) {
        for listener in self.listeners.read().iter() {
            listener.remote_url_changed(url);
        }
    }
}
