//! # Ledger Transport Port
//!
//! The engine treats the ledger as an opaque capability: it submits signed
//! actions, subscribes to the broadcast log and reads program state. It does
//! not implement signing or networking itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::entities::{ActorId, BroadcastEvent, CorrelationId, EventId, StateChange};
use crate::errors::{SubmissionRejected, TransportError};

/// An action ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedAction {
    /// Signing account.
    pub source: ActorId,
    /// Target program.
    pub destination: ActorId,
    /// Encoded action payload.
    pub payload: Vec<u8>,
    /// Gas limit for execution.
    pub gas_limit: u64,
    /// Value transferred with the action.
    pub value: u128,
}

/// A signed action as handed to the ledger client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAction {
    /// The action that was signed.
    pub action: UnsignedAction,
    /// Signature bytes produced by the signer.
    pub signature: Vec<u8>,
}

/// Gas figures returned by an estimation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasEstimate {
    /// Minimum gas limit the action needs.
    pub min_limit: u64,
    /// Gas burned during the dry run.
    pub burned: u64,
}

/// Releases a broadcast subscription. Must be called exactly once.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Channel the transport pushes broadcast events into.
pub type BroadcastSink = mpsc::UnboundedSender<BroadcastEvent>;

/// Channel the transport pushes state-change notices into.
pub type StateChangeSink = mpsc::UnboundedSender<StateChange>;

/// Ledger transport (Driven Port).
///
/// Implementations deliver events through the supplied sink until the
/// returned [`Unsubscribe`] is invoked. Dropping the sink's receiver must not
/// leak the listener; the next delivery attempt is expected to fail and the
/// transport should release it.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Submit a signed action. Returns the correlation id once the ledger
    /// client accepted it locally.
    async fn submit(&self, action: SignedAction) -> Result<CorrelationId, SubmissionRejected>;

    /// Dry-run an action to estimate its gas needs.
    async fn estimate_gas(&self, action: &UnsignedAction) -> Result<GasEstimate, TransportError>;

    /// Subscribe to every message `actor` sends or receives.
    ///
    /// `resume_after` asks the transport to replay events after that cursor
    /// before live delivery; transports without replay ignore it.
    fn subscribe_broadcast(
        &self,
        actor: ActorId,
        resume_after: Option<EventId>,
        sink: BroadcastSink,
    ) -> Result<Unsubscribe, TransportError>;

    /// Subscribe to state-change notices.
    fn subscribe_state_changes(&self, sink: StateChangeSink)
        -> Result<Unsubscribe, TransportError>;

    /// Read a slice of `actor` state. `query` is the encoded query payload.
    async fn read(&self, actor: ActorId, query: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Whether `resume_after` is honoured by `subscribe_broadcast`.
    fn supports_replay(&self) -> bool {
        false
    }
}
