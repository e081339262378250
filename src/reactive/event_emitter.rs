//! EventEmitter<T>: typed synchronous pub/sub.
//!
//! Every repository, query subject and live value owns one. Listeners are
//! stored as `Arc<dyn Fn(&T)>` and snapshotted before each emit:
//!   - a listener removed during an emit still runs in that round;
//!   - a listener added during an emit first runs on the next one.
//!
//! The internal lock is never held while a listener runs, so listeners may
//! re-enter `on`/`off`/`emit` (a query recompute triggered from inside
//! another recompute relies on this).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by [`EventEmitter::on`], passed to [`EventEmitter::off`].
pub type ListenerId = u64;

/// Closure type for event listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

pub struct EventEmitter<T> {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn<T>>)>>,
    next_id: AtomicU64,
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` and return its [`ListenerId`].
    pub fn on(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove the listener identified by `id`. Unknown ids are ignored.
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Deliver `event` to a snapshot of the registered listeners.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Arc<ListenerFn<T>>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(event);
        }
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}
