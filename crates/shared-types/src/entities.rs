//! # Core Ledger Entities
//!
//! Identifiers and message records observed on the broadcast log.
//!
//! ## Clusters
//!
//! - **Identity**: `ActorId`, `CorrelationId`, `SessionId`
//! - **Broadcast log**: `EventId`, `BroadcastEvent`, `ReplyDetails`, `StateChange`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a hex identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// The input was not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded input had the wrong length.
    #[error("Invalid length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Defines a 32-byte identifier rendered as `0x`-prefixed hex.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Wrap raw bytes.
            #[must_use]
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Render as `0x`-prefixed lowercase hex.
            #[must_use]
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Parse from hex with or without the `0x` prefix.
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                let trimmed = s.trim();
                let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
                let bytes =
                    hex::decode(digits).map_err(|e| IdParseError::InvalidHex(e.to_string()))?;
                let array: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| IdParseError::InvalidLength(bytes.len()))?;
                Ok(Self(array))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Short form keeps log lines readable.
                write!(f, "{}({}..)", stringify!($name), &hex::encode(&self.0[..4]))
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

hex_id!(
    /// An addressable remote program or account on the ledger.
    ActorId
);

hex_id!(
    /// Handle tying a dispatched action to its eventual outcome.
    ///
    /// Issued by the ledger client when a signed action is locally
    /// accepted. It is NOT proof of business success.
    CorrelationId
);

/// Position of an event in the broadcast log.
///
/// Monotonically increasing; used as the replay cursor on resubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// The next position in the log.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one UI context (screen, game session) owning pending calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reply metadata attached to tagged replies.
///
/// Business replies in this protocol are NOT tagged; only automatic replies
/// and failures carry these details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDetails {
    /// The message this event replies to.
    pub in_reply_to: CorrelationId,
    /// Zero for success, non-zero for a business-level failure.
    pub status_code: i32,
}

impl ReplyDetails {
    /// Whether this reply denotes a business-level failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status_code != 0
    }
}

/// A message observed on the shared broadcast log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    /// Position in the log.
    pub id: EventId,
    /// Sending actor.
    pub source: ActorId,
    /// Receiving actor.
    pub destination: ActorId,
    /// Encoded payload.
    pub payload: Vec<u8>,
    /// Present on tagged replies only.
    pub reply_details: Option<ReplyDetails>,
}

impl BroadcastEvent {
    /// Whether the event was sent by or to `actor`.
    #[must_use]
    pub fn involves(&self, actor: &ActorId) -> bool {
        self.source == *actor || self.destination == *actor
    }

    /// Whether this is a failure-tagged reply.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.reply_details.is_some_and(|d| d.is_failure())
    }
}

/// Ledger notice listing the actors whose state changed in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Block in which the change happened.
    pub block: u64,
    /// Actors whose state changed.
    pub changed: Vec<ActorId>,
}

impl StateChange {
    /// Whether `actor` is among the changed actors.
    #[must_use]
    pub fn touches(&self, actor: &ActorId) -> bool {
        self.changed.contains(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_hex_roundtrip() {
        let id = ActorId::new([0xAB; 32]);
        let parsed = ActorId::parse(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("0xabab"));
    }

    #[test]
    fn test_parse_without_prefix() {
        let raw = "11".repeat(32);
        let id: CorrelationId = raw.parse().unwrap();
        assert_eq!(id.as_bytes(), &[0x11; 32]);
    }

    #[test]
    fn test_correlation_id_serialization() {
        let id = CorrelationId::new([9; 32]);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: CorrelationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = ActorId::parse("0x1234").unwrap_err();
        assert_eq!(err, IdParseError::InvalidLength(2));
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        assert!(matches!(
            ActorId::parse("0xzz"),
            Err(IdParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_reply_details_failure() {
        let ok = ReplyDetails {
            in_reply_to: CorrelationId::new([1; 32]),
            status_code: 0,
        };
        let failed = ReplyDetails {
            status_code: 1,
            ..ok
        };
        assert!(!ok.is_failure());
        assert!(failed.is_failure());
    }

    #[test]
    fn test_event_involves() {
        let program = ActorId::new([1; 32]);
        let user = ActorId::new([2; 32]);
        let other = ActorId::new([3; 32]);
        let event = BroadcastEvent {
            id: EventId(7),
            source: program,
            destination: user,
            payload: vec![],
            reply_details: None,
        };
        assert!(event.involves(&program));
        assert!(event.involves(&user));
        assert!(!event.involves(&other));
        assert!(!event.is_failure());
    }

    #[test]
    fn test_event_id_next() {
        assert_eq!(EventId(41).next(), EventId(42));
        assert_eq!(EventId(u64::MAX).next(), EventId(u64::MAX));
    }
}
