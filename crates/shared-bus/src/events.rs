//! # Broadcast Log Records
//!
//! Filters and outgoing message records that flow through the log.

use serde::{Deserialize, Serialize};
use shared_types::entities::{ActorId, BroadcastEvent, ReplyDetails};

/// A message about to be appended to the log. The log assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Sending actor.
    pub source: ActorId,
    /// Receiving actor.
    pub destination: ActorId,
    /// Encoded payload.
    pub payload: Vec<u8>,
    /// Present on tagged replies only.
    pub reply_details: Option<ReplyDetails>,
}

impl LogMessage {
    /// An untagged message.
    #[must_use]
    pub fn new(source: ActorId, destination: ActorId, payload: Vec<u8>) -> Self {
        Self {
            source,
            destination,
            payload,
            reply_details: None,
        }
    }

    /// Attach reply details.
    #[must_use]
    pub fn replying(mut self, details: ReplyDetails) -> Self {
        self.reply_details = Some(details);
        self
    }
}

/// Filter for subscribing to a subset of the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Actors of interest. Empty means all actors.
    pub actors: Vec<ActorId>,
}

impl EventFilter {
    /// Create a filter that accepts every event.
    #[must_use]
    pub fn all() -> Self {
        Self { actors: Vec::new() }
    }

    /// Create a filter for events sent by or to `actor`.
    #[must_use]
    pub fn actor(actor: ActorId) -> Self {
        Self {
            actors: vec![actor],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BroadcastEvent) -> bool {
        self.actors.is_empty() || self.actors.iter().any(|a| event.involves(a))
    }
}
