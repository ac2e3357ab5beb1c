//! Shared, multi-writer event registry.
//!
//! [`EventListeners`](crate::events::EventListeners) is the teacher's
//! single-owner collection: whoever holds `&mut EventListeners<E>` can add
//! listeners, but nobody else can. The Connection Resilience Layer has three
//! independently-owned components (`MessageBuffer`, `FailoverManager`, and
//! the orchestrator itself) that all need to emit into *one* externally
//! subscribable stream (spec.md §6 "Event stream"). `EventHub` wraps the
//! same listener machinery in an `Arc<RwLock<..>>` so a cloned handle can be
//! handed to each component at construction time while subscription stays
//! open for the lifetime of the orchestrator.
use crate::events::{EventListener, EventListeners, ResilienceEvent};
use std::sync::{Arc, RwLock};

/// A clonable handle to a shared [`EventListeners`] collection.
pub struct EventHub<E: ResilienceEvent> {
    inner: Arc<RwLock<EventListeners<E>>>,
}

impl<E: ResilienceEvent> Clone for EventHub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: ResilienceEvent> EventHub<E> {
    /// Creates a new, empty hub.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(EventListeners::new())),
        }
    }

    /// Registers a listener. May be called at any point in the hub's
    /// lifetime, including after components have started emitting.
    pub fn subscribe<L>(&self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.add(listener);
    }

    /// Emits an event to every currently-registered listener, in
    /// registration order. Delivery is best-effort: a panicking listener is
    /// caught (see `EventListeners::emit`) and does not stop fan-out to the
    /// rest.
    pub fn emit(&self, event: &E) {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.emit(event);
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<E: ResilienceEvent> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}
