//! Time-varying values.
//!
//! [`Reactive<T>`] is the one capability a statement parameter needs: read the
//! current snapshot, and be told when it changes. [`LiveValue<T>`] is the
//! mutable implementation, [`Constant<T>`] the literal one.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use super::event_emitter::EventEmitter;

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Callback invoked with each new snapshot.
pub type ChangeFn<T> = Box<dyn Fn(&T) + Send + Sync>;

pub trait Reactive<T>: Send + Sync {
    /// Current value.
    fn snapshot(&self) -> T;

    /// Register `callback` for future values. The current value is not replayed.
    fn on_change(&self, callback: ChangeFn<T>) -> Unsubscribe;
}

// ============================================================================
// LiveValue
// ============================================================================

struct LiveInner<T> {
    value: Mutex<T>,
    emitter: EventEmitter<T>,
}

/// A shared, observable cell. Clones observe and mutate the same value.
pub struct LiveValue<T> {
    inner: Arc<LiveInner<T>>,
}

impl<T> Clone for LiveValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> LiveValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(LiveInner {
                value: Mutex::new(value),
                emitter: EventEmitter::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Replace the value and notify listeners, even if it is unchanged.
    pub fn set(&self, value: T) {
        *self.inner.value.lock() = value.clone();
        self.inner.emitter.emit(&value);
    }

    /// Apply `f` to the current value and publish the result.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let mut guard = self.inner.value.lock();
            let next = f(&guard);
            *guard = next.clone();
            next
        };
        self.inner.emitter.emit(&next);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.emitter.size()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> LiveValue<T> {
    /// Publish `value` only if it differs from the current one.
    /// Returns whether listeners were notified.
    pub fn set_if_changed(&self, value: T) -> bool {
        {
            let mut guard = self.inner.value.lock();
            if *guard == value {
                return false;
            }
            *guard = value.clone();
        }
        self.inner.emitter.emit(&value);
        true
    }
}

impl<T: Clone + Send + Sync + 'static> Reactive<T> for LiveValue<T> {
    fn snapshot(&self) -> T {
        self.get()
    }

    fn on_change(&self, callback: ChangeFn<T>) -> Unsubscribe {
        let id = self.inner.emitter.on(move |value| callback(value));
        let inner = Arc::clone(&self.inner);
        Box::new(move || inner.emitter.off(id))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LiveValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LiveValue")
            .field(&*self.inner.value.lock())
            .finish()
    }
}

// ============================================================================
// Constant
// ============================================================================

/// A literal wrapped in the [`Reactive`] interface. Never notifies.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant<T>(pub T);

impl<T: Clone + Send + Sync> Reactive<T> for Constant<T> {
    fn snapshot(&self) -> T {
        self.0.clone()
    }

    fn on_change(&self, _callback: ChangeFn<T>) -> Unsubscribe {
        Box::new(|| {})
    }
}

// ============================================================================
// JSON projection
// ============================================================================

/// Views a typed reactive value as JSON, for use as a statement parameter.
pub(crate) struct JsonReactive<T> {
    source: Arc<dyn Reactive<T>>,
}

impl<T> JsonReactive<T> {
    pub(crate) fn new(source: Arc<dyn Reactive<T>>) -> Self {
        Self { source }
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl<T: Serialize + 'static> Reactive<Value> for JsonReactive<T> {
    fn snapshot(&self) -> Value {
        to_json(&self.source.snapshot())
    }

    fn on_change(&self, callback: ChangeFn<Value>) -> Unsubscribe {
        self.source
            .on_change(Box::new(move |value: &T| callback(&to_json(value))))
    }
}
