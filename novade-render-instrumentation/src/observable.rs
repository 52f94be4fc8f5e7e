//! Event subscription points exposed by a render engine.
//!
//! An [`Observable`] is a list of callbacks that the engine notifies
//! synchronously, in registration order. Registering returns an
//! [`ObserverHandle`]; the handle is the only way to unregister again.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub type ObserverId = Uuid;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync + 'static>;

struct Observer<T> {
    id: ObserverId,
    active: AtomicBool,
    callback: Callback<T>,
}

/// Opaque reference to a registered observer.
///
/// Deliberately not `Clone`: whoever holds the handle owns the subscription.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ObserverHandle {
    id: ObserverId,
}

impl ObserverHandle {
    pub fn id(&self) -> ObserverId {
        self.id
    }
}

/// A synchronous, multi-observer event source.
pub struct Observable<T> {
    observers: Mutex<Vec<Arc<Observer<T>>>>,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers `callback` and returns the handle needed to remove it.
    pub fn add<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.observers.lock().push(Arc::new(Observer {
            id,
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        }));
        ObserverHandle { id }
    }

    /// Unregisters the observer behind `handle`.
    ///
    /// Returns `false` when the observer was already removed; calling this
    /// more than once for the same handle is harmless.
    pub fn remove(&self, handle: &ObserverHandle) -> bool {
        let mut observers = self.observers.lock();
        match observers.iter().position(|observer| observer.id == handle.id) {
            Some(index) => {
                let observer = observers.remove(index);
                // A notification may hold a snapshot containing this observer.
                observer.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Invokes every registered observer with `event`.
    ///
    /// The observer list is not locked while callbacks run, so a callback may
    /// add or remove observers. An observer removed during the notification is
    /// not invoked afterwards; one added during it first sees the next event.
    pub fn notify_observers(&self, event: &T) {
        let snapshot: Vec<Arc<Observer<T>>> = self.observers.lock().clone();
        for observer in snapshot {
            if observer.active.load(Ordering::Acquire) {
                (observer.callback)(event);
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.lock().is_empty()
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.observer_count())
            .finish()
    }
}
