//! Pub-sub callback lists: the Rust shape of the duck-typed
//! `register_on_*` handler lists used throughout the daemon.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, Weak,
};
use tracing::error;

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    handler: Handler<T>,
}

/// A list of synchronous callbacks. Handlers are snapshotted under the
/// lock and invoked without it held, so a handler may register or drop a
/// subscription on the same list without deadlocking.
pub struct CallbackList<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<T>>>,
}

impl<T> Default for CallbackList<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + 'static> CallbackList<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler, returning a guard that deregisters it on drop.
    pub fn register(
        self: &Arc<Self>,
        handler: impl Fn(T) + Send + Sync + 'static,
    ) -> Subscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().push(Entry {
            id,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            list: Arc::downgrade(self),
        }
    }

    /// Invoke every registered handler with a clone of `value`, in
    /// registration order. A handler that panics is caught and logged;
    /// it does not stop the remaining handlers from running.
    pub fn fire(&self, value: T) {
        let handlers: Vec<Handler<T>> = {
            let entries = self.entries.lock().unwrap();
            entries.iter().map(|e| e.handler.clone()).collect()
        };
        for handler in handlers {
            let value = value.clone();
            if panic::catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                error!("callback handler panicked");
            }
        }
    }

    fn deregister(&self, id: u64) {
        self.entries.lock().unwrap().retain(|e| e.id != id);
    }
}

/// RAII deregistration handle returned by [`CallbackList::register`].
#[must_use = "dropping this immediately deregisters the handler"]
pub struct Subscription<T> {
    id: u64,
    list: Weak<CallbackList<T>>,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.deregister(self.id);
        }
    }
}
