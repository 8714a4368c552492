//! # Subscription Handles
//!
//! A [`Subscription`] owns one listener slot in a registry. Dropping it
//! removes the listener synchronously, so cancellation never leaks a sink.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Listener slots keyed by a registry-local id.
pub(crate) struct Listeners<L> {
    next_id: u64,
    slots: HashMap<u64, L>,
}

impl<L> Listeners<L> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            slots: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, listener: L) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.slots.insert(id, listener);
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Keep only listeners for which `f` returns true.
    pub(crate) fn retain(&mut self, f: impl FnMut(&u64, &mut L) -> bool) {
        self.slots.retain(f);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Removes a listener from a registry.
pub(crate) trait ListenerRegistry: Send + Sync {
    fn release(&self, id: u64);
}

impl<L: Send> ListenerRegistry for Mutex<Listeners<L>> {
    fn release(&self, id: u64) {
        self.lock().remove(id);
    }
}

/// Handle to an active listener.
///
/// The listener stays registered until the handle is dropped.
pub struct Subscription {
    id: u64,
    label: &'static str,
    registry: Option<Weak<dyn ListenerRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, label: &'static str, registry: Weak<dyn ListenerRegistry>) -> Self {
        debug!(listener = id, kind = label, "Subscription created");
        Self {
            id,
            label,
            registry: Some(registry),
        }
    }

    /// Registry-local listener id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Release the listener now.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(registry) = self.registry.take() else {
            return;
        };
        if let Some(registry) = registry.upgrade() {
            registry.release(self.id);
        }
        debug!(listener = self.id, kind = self.label, "Subscription dropped");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.label)
            .finish()
    }
}

/// Register `listener` in `registry` and return its guard.
pub(crate) fn register<L: Send + 'static>(
    registry: &Arc<Mutex<Listeners<L>>>,
    label: &'static str,
    listener: L,
) -> Subscription {
    let id = registry.lock().insert(listener);
    let weak: Weak<Mutex<Listeners<L>>> = Arc::downgrade(registry);
    let weak: Weak<dyn ListenerRegistry> = weak;
    Subscription::new(id, label, weak)
}
