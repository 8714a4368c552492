//! # Broadcast Log
//!
//! Ordered, shared log of every message actors exchange.
//!
//! ## Ordering
//!
//! Appends happen under one lock: the event id is assigned, the event is
//! pushed into a bounded history and fanned out to every matching listener
//! before the next append can start. Subscribing with a cursor replays the
//! retained history after that cursor under the same lock, so a listener sees
//! neither a gap nor a duplicate between replay and live delivery.

use crate::events::{EventFilter, LogMessage};
use crate::subscriber::{register, Listeners, Subscription};
use crate::DEFAULT_HISTORY_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::entities::{BroadcastEvent, EventId};
use shared_types::ledger::BroadcastSink;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Trait for appending messages to the log.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append a message and deliver it to matching listeners.
    ///
    /// Returns the event as recorded, with its assigned id.
    async fn publish(&self, message: LogMessage) -> BroadcastEvent;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

struct Listener {
    filter: EventFilter,
    sink: BroadcastSink,
}

struct LogState {
    next_id: EventId,
    history: VecDeque<BroadcastEvent>,
}

/// In-memory broadcast log.
pub struct BroadcastLog {
    state: Mutex<LogState>,
    listeners: Arc<Mutex<Listeners<Listener>>>,
    history_capacity: usize,
    events_published: AtomicU64,
}

impl BroadcastLog {
    /// Create a log with default history capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a log retaining at most `capacity` events for replay.
    #[must_use]
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LogState {
                next_id: EventId(1),
                history: VecDeque::new(),
            }),
            listeners: Arc::new(Mutex::new(Listeners::new())),
            history_capacity: capacity,
            events_published: AtomicU64::new(0),
        }
    }

    /// Append a message synchronously.
    pub fn append(&self, message: LogMessage) -> BroadcastEvent {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id = id.next();

        let event = BroadcastEvent {
            id,
            source: message.source,
            destination: message.destination,
            payload: message.payload,
            reply_details: message.reply_details,
        };

        if self.history_capacity > 0 {
            if state.history.len() >= self.history_capacity {
                state.history.pop_front();
            }
            state.history.push_back(event.clone());
        }

        let mut delivered = 0usize;
        self.listeners.lock().retain(|listener_id, listener| {
            if !listener.filter.matches(&event) {
                return true;
            }
            if listener.sink.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                // Receiver gone; release the slot.
                debug!(listener = *listener_id, "Listener closed, releasing");
                false
            }
        });
        drop(state);

        self.events_published.fetch_add(1, Ordering::Relaxed);
        debug!(event_id = %id, receivers = delivered, "Event appended");
        event
    }

    /// Subscribe `sink` to events matching `filter`.
    ///
    /// With a cursor, retained events after it are delivered first.
    pub fn subscribe(
        &self,
        filter: EventFilter,
        resume_after: Option<EventId>,
        sink: BroadcastSink,
    ) -> Subscription {
        // Appends are blocked while we replay and register.
        let state = self.state.lock();
        if let Some(cursor) = resume_after {
            let mut replayed = 0usize;
            for event in state.history.iter().filter(|e| e.id > cursor) {
                if filter.matches(event) && sink.send(event.clone()).is_ok() {
                    replayed += 1;
                }
            }
            debug!(cursor = %cursor, replayed, "Replayed history");
        }
        let subscription = register(&self.listeners, "broadcast", Listener { filter, sink });
        drop(state);
        subscription
    }

    /// Retained events after `cursor` that match `filter`.
    #[must_use]
    pub fn history_after(&self, filter: &EventFilter, cursor: EventId) -> Vec<BroadcastEvent> {
        self.state
            .lock()
            .history
            .iter()
            .filter(|e| e.id > cursor && filter.matches(e))
            .cloned()
            .collect()
    }

    /// Id of the most recently appended event.
    #[must_use]
    pub fn head(&self) -> Option<EventId> {
        let next = self.state.lock().next_id;
        (next.0 > 1).then(|| EventId(next.0 - 1))
    }

    /// Number of active listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Drop every listener, as a transport-side close would.
    pub fn disconnect_all(&self) {
        self.listeners.lock().clear();
    }
}

impl Default for BroadcastLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for BroadcastLog {
    async fn publish(&self, message: LogMessage) -> BroadcastEvent {
        self.append(message)
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
