//! Bounded history of tapped events.
//!
//! Each event is claimed by at most one call. Unclaimed events are kept so
//! a call registered later, or a retry cycle, can still match them.
//!
//! Ids at or below the highest evicted id are refused, so an event replayed
//! after eviction is not ingested twice.

use shared_types::entities::{BroadcastEvent, CorrelationId, EventId};
use std::collections::VecDeque;

/// One retained event.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub event: BroadcastEvent,
    pub claimed_by: Option<CorrelationId>,
}

/// Bounded, insertion-ordered event history.
#[derive(Debug)]
pub struct EventHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    high_water: Option<EventId>,
    floor: Option<EventId>,
}

impl EventHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            high_water: None,
            floor: None,
        }
    }

    /// Append an event. Returns false if the id is retained or at or below
    /// the eviction floor.
    pub fn push(&mut self, event: BroadcastEvent) -> bool {
        if self.floor.is_some_and(|floor| event.id <= floor) || self.contains(event.id) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                let id = evicted.event.id;
                self.floor = Some(self.floor.map_or(id, |floor| floor.max(id)));
            }
        }
        self.high_water = Some(self.high_water.map_or(event.id, |hw| hw.max(event.id)));
        self.entries.push_back(HistoryEntry {
            event,
            claimed_by: None,
        });
        true
    }

    #[must_use]
    pub fn contains(&self, id: EventId) -> bool {
        self.entries.iter().any(|e| e.event.id == id)
    }

    /// Mark an event as claimed. Returns false if missing or already claimed.
    pub fn claim(&mut self, id: EventId, by: CorrelationId) -> bool {
        match self.entries.iter_mut().find(|e| e.event.id == id) {
            Some(entry) if entry.claimed_by.is_none() => {
                entry.claimed_by = Some(by);
                true
            }
            _ => false,
        }
    }

    /// Ids of unclaimed events in arrival order.
    #[must_use]
    pub fn unclaimed(&self) -> Vec<EventId> {
        self.entries
            .iter()
            .filter(|e| e.claimed_by.is_none())
            .map(|e| e.event.id)
            .collect()
    }

    pub fn get(&self, id: EventId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.event.id == id)
    }

    /// Highest event id ever retained.
    #[must_use]
    pub fn high_water(&self) -> Option<EventId> {
        self.high_water
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::entities::ActorId;

    fn event(id: u64) -> BroadcastEvent {
        BroadcastEvent {
            id: EventId(id),
            source: ActorId::new([1; 32]),
            destination: ActorId::new([2; 32]),
            payload: vec![],
            reply_details: None,
        }
    }

    #[test]
    fn test_push_dedupes() {
        let mut history = EventHistory::new(8);
        assert!(history.push(event(1)));
        assert!(!history.push(event(1)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_claim_once() {
        let mut history = EventHistory::new(8);
        history.push(event(1));
        history.push(event(2));

        let owner = CorrelationId::new([7; 32]);
        assert!(history.claim(EventId(1), owner));
        assert!(!history.claim(EventId(1), owner));
        assert_eq!(history.unclaimed(), vec![EventId(2)]);
    }

    #[test]
    fn test_bounded() {
        let mut history = EventHistory::new(2);
        for id in 1..=3 {
            history.push(event(id));
        }
        assert_eq!(history.len(), 2);
        assert!(!history.contains(EventId(1)));
        assert_eq!(history.high_water(), Some(EventId(3)));
    }

    #[test]
    fn test_evicted_event_not_accepted_again() {
        let mut history = EventHistory::new(2);
        for id in 1..=3 {
            assert!(history.push(event(id)));
        }
        assert!(!history.push(event(1)));
        assert!(history.push(event(4)));
        assert_eq!(history.len(), 2);
        assert!(!history.contains(EventId(1)));
    }
}
