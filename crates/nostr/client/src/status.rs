//! Observable set of open relays.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Listener invoked with the new set of open relay URLs.
pub type ConnectedListener = Arc<dyn Fn(&[String]) + Send + Sync>;

#[derive(Default)]
struct Inner {
    open: BTreeSet<String>,
    listeners: BTreeMap<u64, ConnectedListener>,
    next_id: u64,
}

/// Tracks which relays are open and notifies listeners on change.
#[derive(Clone, Default)]
pub struct ConnectedRelays {
    inner: Arc<Mutex<Inner>>,
}

impl ConnectedRelays {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open relays, sorted.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().open.iter().cloned().collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().open.contains(url)
    }

    /// Record whether `url` is open. Listeners run only on an actual change.
    pub fn set(&self, url: &str, open: bool) {
        let (snapshot, listeners) = {
            let mut inner = self.lock();
            let changed = if open {
                inner.open.insert(url.to_string())
            } else {
                inner.open.remove(url)
            };
            if !changed {
                return;
            }
            let snapshot: Vec<String> = inner.open.iter().cloned().collect();
            let listeners: Vec<ConnectedListener> = inner.listeners.values().cloned().collect();
            (snapshot, listeners)
        };
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Register a listener; dropping the handle unregisters it.
    pub fn subscribe(&self, listener: ConnectedListener) -> ListenerHandle {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, listener);
        ListenerHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// Registration of a connected-relays listener.
#[must_use = "dropping the handle unregisters the listener"]
pub struct ListenerHandle {
    id: u64,
    inner: Weak<Mutex<Inner>>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }
}
