//! # In-Memory Ledger
//!
//! A [`LedgerTransport`] backed by a [`BroadcastLog`] and a state table.
//!
//! It never executes programs. Program behaviour is scripted: a responder
//! closure may emit messages for each accepted submission, state slices are
//! set directly, and rejections or read failures are queued by the caller.

use crate::events::{EventFilter, LogMessage};
use crate::publisher::BroadcastLog;
use crate::subscriber::{register, Listeners};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::entities::{ActorId, BroadcastEvent, CorrelationId, EventId, StateChange};
use shared_types::errors::{RejectReason, SubmissionRejected, TransportError};
use shared_types::ledger::{
    BroadcastSink, GasEstimate, LedgerTransport, SignedAction, StateChangeSink, Unsubscribe,
    UnsignedAction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Scripted program behaviour: messages to emit after a submission.
pub type Responder = Box<dyn Fn(&SignedAction, CorrelationId) -> Vec<LogMessage> + Send + Sync>;

/// In-memory ledger transport.
pub struct InMemoryLedger {
    log: BroadcastLog,
    replay: bool,
    connected: AtomicBool,
    next_message: AtomicU64,
    block: AtomicU64,
    rejections: Mutex<VecDeque<RejectReason>>,
    submitted: Mutex<Vec<(CorrelationId, SignedAction)>>,
    gas: Mutex<Result<GasEstimate, TransportError>>,
    gas_requests: AtomicU64,
    state: Mutex<HashMap<(ActorId, Vec<u8>), Vec<u8>>>,
    failing_reads: Mutex<HashSet<Vec<u8>>>,
    reads: AtomicU64,
    state_listeners: Arc<Mutex<Listeners<StateChangeSink>>>,
    responder: Mutex<Option<Responder>>,
}

impl InMemoryLedger {
    /// Create a ledger that honours resubscribe cursors.
    #[must_use]
    pub fn new() -> Self {
        Self::with_log(BroadcastLog::new(), true)
    }

    /// Create a ledger that ignores resubscribe cursors.
    #[must_use]
    pub fn without_replay() -> Self {
        Self::with_log(BroadcastLog::new(), false)
    }

    /// Create a ledger over an existing log.
    #[must_use]
    pub fn with_log(log: BroadcastLog, replay: bool) -> Self {
        Self {
            log,
            replay,
            connected: AtomicBool::new(true),
            next_message: AtomicU64::new(1),
            block: AtomicU64::new(0),
            rejections: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            gas: Mutex::new(Ok(GasEstimate {
                min_limit: 1_000_000_000,
                burned: 900_000_000,
            })),
            gas_requests: AtomicU64::new(0),
            state: Mutex::new(HashMap::new()),
            failing_reads: Mutex::new(HashSet::new()),
            reads: AtomicU64::new(0),
            state_listeners: Arc::new(Mutex::new(Listeners::new())),
            responder: Mutex::new(None),
        }
    }

    /// The underlying broadcast log.
    #[must_use]
    pub fn log(&self) -> &BroadcastLog {
        &self.log
    }

    /// Emit a message onto the broadcast log.
    pub fn emit(&self, message: LogMessage) -> BroadcastEvent {
        self.log.append(message)
    }

    /// Announce that `changed` actors had their state updated.
    pub fn emit_state_change(&self, changed: Vec<ActorId>) -> StateChange {
        let block = self.block.fetch_add(1, Ordering::Relaxed) + 1;
        let notice = StateChange { block, changed };
        self.state_listeners
            .lock()
            .retain(|_, sink| sink.send(notice.clone()).is_ok());
        notice
    }

    /// Install a responder run after each accepted submission.
    pub fn respond_with(&self, responder: Responder) {
        *self.responder.lock() = Some(responder);
    }

    /// Reject the next submission with `reason`.
    pub fn reject_next(&self, reason: RejectReason) {
        self.rejections.lock().push_back(reason);
    }

    /// Set the result of subsequent gas estimations.
    pub fn set_gas_estimate(&self, estimate: Result<GasEstimate, TransportError>) {
        *self.gas.lock() = estimate;
    }

    /// Set the state slice returned for `(actor, query)`.
    pub fn set_state(&self, actor: ActorId, query: Vec<u8>, bytes: Vec<u8>) {
        self.state.lock().insert((actor, query), bytes);
    }

    /// Make reads of `query` fail until [`Self::restore_read`] is called.
    pub fn fail_read(&self, query: Vec<u8>) {
        self.failing_reads.lock().insert(query);
    }

    /// Undo [`Self::fail_read`].
    pub fn restore_read(&self, query: &[u8]) {
        self.failing_reads.lock().remove(query);
    }

    /// Toggle connectivity. While disconnected, subscribe calls fail.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Close every broadcast listener from the transport side.
    pub fn drop_subscribers(&self) {
        self.log.disconnect_all();
    }

    /// Accepted submissions in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<SignedAction> {
        self.submitted
            .lock()
            .iter()
            .map(|(_, action)| action.clone())
            .collect()
    }

    /// Number of gas estimation calls.
    #[must_use]
    pub fn gas_requests(&self) -> u64 {
        self.gas_requests.load(Ordering::Relaxed)
    }

    /// Number of state reads.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn issue_correlation_id(&self) -> CorrelationId {
        let n = self.next_message.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_be_bytes());
        bytes[31] = 0x4d;
        CorrelationId::new(bytes)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerTransport for InMemoryLedger {
    async fn submit(&self, action: SignedAction) -> Result<CorrelationId, SubmissionRejected> {
        if let Some(reason) = self.rejections.lock().pop_front() {
            warn!(reason = %reason, "Submission rejected");
            return Err(reason.into());
        }

        let id = self.issue_correlation_id();
        self.submitted.lock().push((id, action.clone()));
        debug!(correlation_id = %id, "Submission accepted");

        let scripted = self
            .responder
            .lock()
            .as_ref()
            .map(|respond| respond(&action, id))
            .unwrap_or_default();
        for message in scripted {
            self.log.append(message);
        }

        Ok(id)
    }

    async fn estimate_gas(&self, _action: &UnsignedAction) -> Result<GasEstimate, TransportError> {
        self.gas_requests.fetch_add(1, Ordering::Relaxed);
        self.gas.lock().clone()
    }

    fn subscribe_broadcast(
        &self,
        actor: ActorId,
        resume_after: Option<EventId>,
        sink: BroadcastSink,
    ) -> Result<Unsubscribe, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let cursor = if self.replay { resume_after } else { None };
        let subscription = self.log.subscribe(EventFilter::actor(actor), cursor, sink);
        Ok(Box::new(move || subscription.cancel()))
    }

    fn subscribe_state_changes(
        &self,
        sink: StateChangeSink,
    ) -> Result<Unsubscribe, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let subscription = register(&self.state_listeners, "state-change", sink);
        Ok(Box::new(move || subscription.cancel()))
    }

    async fn read(&self, actor: ActorId, query: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.failing_reads.lock().contains(query) {
            return Err(TransportError::ReadFailed {
                actor: actor.to_string(),
                reason: "injected failure".into(),
            });
        }
        self.state
            .lock()
            .get(&(actor, query.to_vec()))
            .cloned()
            .ok_or_else(|| TransportError::ReadFailed {
                actor: actor.to_string(),
                reason: "no state for query".into(),
            })
    }

    fn supports_replay(&self) -> bool {
        self.replay
    }
}
