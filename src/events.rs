//! Observer plumbing
//!
//! Explicit subscriber lists with unsubscribe handles. Listeners run on the
//! emitting task; they must not block.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ListenerMap<T> = Mutex<HashMap<u64, Listener<T>>>;

/// A subscriber list for one kind of event
pub struct Emitter<T> {
    listeners: Arc<ListenerMap<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener. Dropping the returned subscription unsubscribes.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .insert(id, Arc::new(listener));

        let listeners = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(listeners) = Weak::upgrade(&listeners) {
                    listeners.lock().unwrap().remove(&id);
                }
            })),
        }
    }

    /// Fire the event to every current listener
    ///
    /// Listeners are snapshotted first so a listener may subscribe or
    /// unsubscribe from within its callback.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in snapshot {
            listener(value);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe handle returned by [`Emitter::subscribe`]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Keep the listener registered for the lifetime of the emitter
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
