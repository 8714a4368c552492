//! # Bounded Seen-Event Cache
//!
//! Replay suppression for broadcast events.
//!
//! - Event ids are remembered in arrival order up to a fixed capacity
//! - The oldest id is evicted when the cache is full
//! - Ids at or below the eviction floor are treated as already seen, so
//!   eviction never re-opens the door to a replay

use shared_types::entities::EventId;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Errors from seen-cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeenError {
    /// The event was delivered before.
    #[error("Event {id} was already delivered")]
    AlreadySeen { id: EventId },

    /// The event is older than anything the cache still remembers.
    #[error("Event {id} is below the replay floor {floor}")]
    BelowFloor { id: EventId, floor: EventId },
}

/// Bounded cache of delivered event ids.
pub struct SeenEventCache {
    /// Ids currently remembered.
    seen: HashSet<EventId>,

    /// Arrival order for eviction.
    order: VecDeque<EventId>,

    /// Highest id ever evicted.
    floor: Option<EventId>,

    /// Highest id ever accepted.
    high_water: Option<EventId>,

    /// Maximum remembered ids.
    capacity: usize,
}

impl SeenEventCache {
    /// Default number of remembered ids.
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// Create a cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a cache with a custom capacity (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            floor: None,
            high_water: None,
            capacity: capacity.max(1),
        }
    }

    /// Check an id and remember it atomically.
    ///
    /// # Errors
    ///
    /// - `SeenError::AlreadySeen` - the id is remembered
    /// - `SeenError::BelowFloor` - the id is at or below the eviction floor
    pub fn check_and_add(&mut self, id: EventId) -> Result<(), SeenError> {
        if let Some(floor) = self.floor {
            if id <= floor {
                return Err(SeenError::BelowFloor { id, floor });
            }
        }

        if self.seen.contains(&id) {
            return Err(SeenError::AlreadySeen { id });
        }

        if self.order.len() >= self.capacity {
            self.evict_oldest();
        }

        self.seen.insert(id);
        self.order.push_back(id);
        self.high_water = Some(self.high_water.map_or(id, |hw| hw.max(id)));

        Ok(())
    }

    /// Check if an id is remembered without adding it.
    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.seen.contains(id)
    }

    /// Highest id accepted so far. Used as the resubscribe cursor.
    #[must_use]
    pub fn high_water(&self) -> Option<EventId> {
        self.high_water
    }

    /// Get the number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.order.pop_front() {
            self.seen.remove(&oldest);
            self.floor = Some(self.floor.map_or(oldest, |f| f.max(oldest)));
        }
    }
}

impl Default for SeenEventCache {
    fn default() -> Self {
        Self::new()
    }
}
