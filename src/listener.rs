//! Synchronous listener registries.
//!
//! Listeners are invoked in registration order on the thread that produced
//! the event. Delivery iterates over a snapshot, so a listener may register or
//! revoke listeners from inside its own callback. A panicking listener is
//! logged and skipped; the remaining listeners are still notified.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use location::Location;
use manager::LifecycleEvent;
use route::{Route, WaypointEvent};
use sentence::Sentence;

/// Receives every completed sentence.
pub trait SentenceListener: Send + Sync {
    fn receive_sentence(&self, sentence: &Sentence);
}

/// Receives fused location samples.
pub trait LocationListener: Send + Sync {
    fn receive_location(&self, location: &Location);
}

/// Receives the waypoint events of the route it was registered with.
pub trait RouteListener: Send + Sync {
    fn waypoint_event(&self, route: &Route, event: &WaypointEvent);
}

/// Receives start/stop notifications of a `LocationManager`.
pub trait LifecycleListener: Send + Sync {
    fn lifecycle_event(&self, event: &LifecycleEvent);
}

impl<F> SentenceListener for F
where
    F: Fn(&Sentence) + Send + Sync,
{
    fn receive_sentence(&self, sentence: &Sentence) {
        self(sentence)
    }
}

impl<F> LocationListener for F
where
    F: Fn(&Location) + Send + Sync,
{
    fn receive_location(&self, location: &Location) {
        self(location)
    }
}

impl<F> RouteListener for F
where
    F: Fn(&Route, &WaypointEvent) + Send + Sync,
{
    fn waypoint_event(&self, route: &Route, event: &WaypointEvent) {
        self(route, event)
    }
}

impl<F> LifecycleListener for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn lifecycle_event(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// Handle returned on registration, used to revoke the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

struct Entry<L: ?Sized> {
    id: ListenerId,
    listener: Arc<L>,
}

impl<L: ?Sized> Clone for Entry<L> {
    fn clone(&self) -> Self {
        Entry {
            id: self.id,
            listener: self.listener.clone(),
        }
    }
}

/// Copy-on-write list of listeners keyed by identity.
pub struct ListenerRegistry<L: ?Sized> {
    entries: RwLock<Arc<Vec<Entry<L>>>>,
    next_id: AtomicUsize,
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        ListenerRegistry::new()
    }
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        ListenerRegistry {
            entries: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Registers `listener`. Registering the same `Arc` twice returns the
    /// handle of the existing registration.
    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.iter().find(|e| Arc::ptr_eq(&e.listener, &listener)) {
            return entry.id;
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut updated = Vec::with_capacity(entries.len() + 1);
        updated.extend(entries.iter().cloned());
        updated.push(Entry { id, listener });
        *entries = Arc::new(updated);
        id
    }

    /// Revokes a registration. Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|e| e.id == id) {
            return false;
        }
        let updated = entries.iter().filter(|e| e.id != id).cloned().collect();
        *entries = Arc::new(updated);
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<Vec<Entry<L>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls `f` for every listener registered at the time of the call.
    /// `what` names the event in the log if a listener panics.
    pub fn notify<F>(&self, what: &str, f: F)
    where
        F: Fn(&L),
    {
        for entry in self.snapshot().iter() {
            let listener = &*entry.listener;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(listener))) {
                error!(
                    "Error in {} listener {:?}: {}",
                    what,
                    entry.id,
                    panic_message(&*payload)
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
