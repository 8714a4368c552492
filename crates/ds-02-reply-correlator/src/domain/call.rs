//! # Pending Call State Machine
//!
//! ```text
//!            ack              reply
//!   Sent ─────────→ Acknowledged ─────→ Resolved
//!    │  \                 │
//!    │   \ failure        │ failure / decode error
//!    │    └──────────→ Failed ←┘
//!    │                    │
//!    └──→ TimedOut ←──────┘  (retry budget spent)
//! ```
//!
//! A business reply that arrives before the acknowledgement is held on the
//! call and resolves it as soon as the acknowledgement lands.

use crate::error::CallError;
use ds_01_metadata_codec::{PayloadDecoder, ProgramReply};
use serde::{Deserialize, Serialize};
use shared_types::entities::{CorrelationId, EventId, SessionId};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// Lifecycle state of a pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    Sent,
    Acknowledged,
    Resolved,
    Failed,
    TimedOut,
}

impl CallState {
    /// Whether the call has settled.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Failed | Self::TimedOut)
    }

    /// Whether `self -> next` is an edge of the state machine.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        use CallState::{Acknowledged, Failed, Resolved, Sent, TimedOut};
        matches!(
            (self, next),
            (Sent, Acknowledged | Failed | TimedOut) | (Acknowledged, Resolved | Failed | TimedOut)
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sent => "sent",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// How a call resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The business reply arrived and decoded.
    Reply(ProgramReply),
    /// The call asked for no business reply and was acknowledged.
    Acknowledged,
}

impl Resolution {
    /// The business reply, if any.
    #[must_use]
    pub fn reply(&self) -> Option<&ProgramReply> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Acknowledged => None,
        }
    }
}

/// Final result of a call. Delivered exactly once.
pub type CallOutcome = Result<Resolution, CallError>;

/// Per-call options fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Wait for a business reply, or settle on acknowledgement.
    pub expect_reply: bool,
    /// Retry cycles before timing out. `None` uses the correlator default.
    pub retries: Option<u32>,
    /// Untagged events at or below this id predate the call.
    pub not_before: Option<EventId>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            expect_reply: true,
            retries: None,
            not_before: None,
        }
    }
}

/// One in-flight action.
pub struct PendingCall {
    pub(crate) correlation_id: CorrelationId,
    pub(crate) session: SessionId,
    pub(crate) decoder: Arc<dyn PayloadDecoder>,
    pub(crate) created_at: Instant,
    pub(crate) retries_left: u32,
    pub(crate) retries_budget: u32,
    pub(crate) state: CallState,
    pub(crate) expect_reply: bool,
    pub(crate) not_before: Option<EventId>,
    pub(crate) ack: Option<EventId>,
    pub(crate) early_reply: Option<(EventId, ProgramReply)>,
    pub(crate) sender: Option<oneshot::Sender<CallOutcome>>,
}

impl PendingCall {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        session: SessionId,
        decoder: Arc<dyn PayloadDecoder>,
        retries: u32,
        options: CallOptions,
        sender: oneshot::Sender<CallOutcome>,
    ) -> Self {
        Self {
            correlation_id,
            session,
            decoder,
            created_at: Instant::now(),
            retries_left: retries,
            retries_budget: retries,
            state: CallState::Sent,
            expect_reply: options.expect_reply,
            not_before: options.not_before,
            ack: None,
            early_reply: None,
            sender: Some(sender),
        }
    }

    /// Move to `next` if the edge exists.
    pub(crate) fn transition(&mut self, next: CallState) -> bool {
        if self.state.can_transition(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Whether an untagged event with this id may belong to the call.
    pub(crate) fn accepts_untagged(&self, id: EventId) -> bool {
        self.not_before.map_or(true, |floor| id > floor)
    }

    pub(crate) fn summary(&self) -> PendingSummary {
        PendingSummary {
            correlation_id: self.correlation_id,
            session: self.session,
            state: self.state,
            retries_left: self.retries_left,
        }
    }
}

/// Read-only view of one pending call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub correlation_id: CorrelationId,
    pub session: SessionId,
    pub state: CallState,
    pub retries_left: u32,
}

/// Immutable set of pending calls in dispatch order.
///
/// Published wholesale; consumers never see a partially updated set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSet {
    pub calls: Vec<PendingSummary>,
}

impl PendingSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: &CorrelationId) -> Option<&PendingSummary> {
        self.calls.iter().find(|c| c.correlation_id == *id)
    }
}
