//! # Reply Correlator
//!
//! Maps dispatched actions to their asynchronous replies on the broadcast
//! log.
//!
//! ## Matching rules
//!
//! - **Tagged failure** (`in_reply_to == id`, non-zero status): the call fails
//!   with `CallError::Business`; the payload is decoded as an error message.
//! - **Tagged success** (status zero): the automatic reply; acknowledges
//!   the call.
//! - **Untagged** (from the tracked program, newer than the call's floor):
//!   offered to pending calls in dispatch order.
//!   1. The first call whose decoder yields a non-empty reply claims it as
//!      its business reply.
//!   2. Otherwise the first unacknowledged call claims it as its
//!      acknowledgement.
//!   3. Otherwise the first acknowledged call whose decode failed is rejected
//!      with `CallError::Decode`.
//!   4. Otherwise (only empty decodes) the event stays unclaimed.
//!
//! Business replies carry no correlation id. Two concurrent calls whose
//! replies decode to the same variant may receive each other's payload;
//! each still settles exactly once.
//!
//! ## Flow
//!
//! 1. Dispatcher reads `watermark()` and submits the signed action
//! 2. Dispatcher calls `register()` and hands the receiver to the caller
//! 3. Tapped events arrive through `ingest()`
//! 4. The scheduler calls `tick()` once per retry interval
//! 5. The call settles exactly once, or is abandoned with its session

use crate::domain::call::PendingCall;
use crate::domain::{
    CallOptions, CallOutcome, CallState, CorrelatorConfig, EventHistory, PendingSet, Resolution,
};
use crate::error::{CallError, CorrelatorError};
use crate::ports::CallObserver;
use crate::service::outcome::OutcomeReceiver;
use ds_01_metadata_codec::{decode_error_message, CodecError, PayloadDecoder, ProgramReply};
use parking_lot::{Mutex, RwLock};
use shared_types::entities::{BroadcastEvent, CorrelationId, EventId, ReplyDetails, SessionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Statistics for the correlator
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Total calls registered
    pub registered: AtomicU64,
    /// Total calls resolved
    pub resolved: AtomicU64,
    /// Total calls rejected (business or decode failure)
    pub rejected: AtomicU64,
    /// Total calls timed out
    pub timed_out: AtomicU64,
    /// Total calls abandoned with their session
    pub abandoned: AtomicU64,
    /// Events ignored because they were already ingested
    pub duplicate_events: AtomicU64,
}

type Settled = Vec<(CorrelationId, CallOutcome)>;

struct Inner {
    /// Pending calls keyed by dispatch sequence.
    calls: BTreeMap<u64, PendingCall>,
    by_id: HashMap<CorrelationId, u64>,
    next_seq: u64,
    history: EventHistory,
}

/// Reply correlator.
pub struct ReplyCorrelator {
    config: CorrelatorConfig,
    inner: Mutex<Inner>,
    pending_tx: watch::Sender<Arc<PendingSet>>,
    observers: RwLock<Vec<Arc<dyn CallObserver>>>,
    stats: Arc<CorrelatorStats>,
}

impl ReplyCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        let (pending_tx, _) = watch::channel(Arc::new(PendingSet::default()));
        Self {
            inner: Mutex::new(Inner {
                calls: BTreeMap::new(),
                by_id: HashMap::new(),
                next_seq: 0,
                history: EventHistory::new(config.history_capacity),
            }),
            config,
            pending_tx,
            observers: RwLock::new(Vec::new()),
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Highest event id seen so far. Untagged events at or below it cannot
    /// be replies to an action submitted afterwards.
    #[must_use]
    pub fn watermark(&self) -> Option<EventId> {
        self.inner.lock().history.high_water()
    }

    /// Register a pending call and get its outcome receiver.
    ///
    /// Retained events are scanned immediately, so replies that arrived
    /// before registration are matched.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        session: SessionId,
        decoder: Arc<dyn PayloadDecoder>,
        options: CallOptions,
    ) -> Result<OutcomeReceiver, CorrelatorError> {
        let (tx, rx) = oneshot::channel();
        let mut settled = Settled::new();
        {
            let mut inner = self.inner.lock();
            if inner.by_id.contains_key(&correlation_id) {
                return Err(CorrelatorError::Duplicate(correlation_id));
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;
            let retries = options.retries.unwrap_or(self.config.max_retries);
            inner.calls.insert(
                seq,
                PendingCall::new(correlation_id, session, decoder, retries, options, tx),
            );
            inner.by_id.insert(correlation_id, seq);
            self.stats.registered.fetch_add(1, Ordering::Relaxed);

            debug!(
                correlation_id = %correlation_id,
                session = %session,
                retries,
                expect_reply = options.expect_reply,
                "Registered pending call"
            );

            self.rescan(&mut inner, &mut settled);
            self.publish(&inner);
        }
        self.notify(&settled);
        Ok(OutcomeReceiver::new(correlation_id, rx))
    }

    /// Feed one tapped event.
    ///
    /// Returns false if the event is still retained or is no newer than the
    /// highest evicted one.
    pub fn ingest(&self, event: BroadcastEvent) -> bool {
        let mut settled = Settled::new();
        {
            let mut inner = self.inner.lock();
            let id = event.id;
            if !inner.history.push(event) {
                self.stats.duplicate_events.fetch_add(1, Ordering::Relaxed);
                debug!(event_id = %id, "Duplicate event ignored");
                return false;
            }
            self.route(&mut inner, id, &mut settled);
            self.publish(&inner);
        }
        self.notify(&settled);
        true
    }

    /// One retry cycle: rescan retained events, then spend one retry of
    /// every unsettled call and time out those with none left.
    ///
    /// Returns the calls that timed out.
    pub fn tick(&self) -> Vec<CorrelationId> {
        let mut settled = Settled::new();
        let mut timed_out = Vec::new();
        {
            let mut inner = self.inner.lock();
            self.rescan(&mut inner, &mut settled);

            let mut exhausted = Vec::new();
            for (seq, call) in &mut inner.calls {
                call.retries_left = call.retries_left.saturating_sub(1);
                if call.retries_left == 0 {
                    exhausted.push((*seq, call.retries_budget));
                }
            }
            for (seq, retries) in exhausted {
                if let Some(id) = self.settle(
                    &mut inner,
                    seq,
                    Err(CallError::Timeout { retries }),
                    &mut settled,
                ) {
                    timed_out.push(id);
                }
            }
            self.publish(&inner);
        }
        self.notify(&settled);
        timed_out
    }

    /// Drop every call owned by `session` without settling it.
    pub fn abandon(&self, session: SessionId) -> usize {
        self.abandon_where(|call| call.session == session)
    }

    /// Outcome for a submitted call that is never registered.
    ///
    /// Resolves to `CallError::Abandoned` immediately.
    pub fn abandoned(&self, correlation_id: CorrelationId) -> OutcomeReceiver {
        let (_, rx) = oneshot::channel();
        self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
        debug!(correlation_id = %correlation_id, "Abandoned unregistered call");
        OutcomeReceiver::new(correlation_id, rx)
    }

    /// Drop every pending call without settling it.
    pub fn abandon_all(&self) -> usize {
        self.abandon_where(|_| true)
    }

    fn abandon_where(&self, predicate: impl Fn(&PendingCall) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<u64> = inner
            .calls
            .iter()
            .filter(|(_, call)| predicate(call))
            .map(|(seq, _)| *seq)
            .collect();

        for seq in &doomed {
            if let Some(call) = inner.calls.remove(seq) {
                inner.by_id.remove(&call.correlation_id);
                debug!(correlation_id = %call.correlation_id, state = %call.state, "Abandoned pending call");
                // Dropping the call drops its sender.
            }
        }

        let count = doomed.len();
        if count > 0 {
            self.stats
                .abandoned
                .fetch_add(count as u64, Ordering::Relaxed);
            info!(abandoned = count, "Abandoned pending calls");
            self.publish(&inner);
        }
        count
    }

    /// Subscribe to the published pending set.
    #[must_use]
    pub fn subscribe_pending(&self) -> watch::Receiver<Arc<PendingSet>> {
        self.pending_tx.subscribe()
    }

    /// The current pending set.
    #[must_use]
    pub fn pending(&self) -> Arc<PendingSet> {
        self.pending_tx.borrow().clone()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    #[must_use]
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.inner.lock().by_id.contains_key(correlation_id)
    }

    /// Register an observer for settled calls.
    pub fn add_observer(&self, observer: Arc<dyn CallObserver>) {
        self.observers.write().push(observer);
    }

    #[must_use]
    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn rescan(&self, inner: &mut Inner, settled: &mut Settled) {
        if inner.calls.is_empty() {
            return;
        }
        for id in inner.history.unclaimed() {
            self.route(inner, id, settled);
        }
    }

    fn route(&self, inner: &mut Inner, id: EventId, settled: &mut Settled) {
        let Some(entry) = inner.history.get(id) else {
            return;
        };
        if entry.claimed_by.is_some() {
            return;
        }
        let event = entry.event.clone();
        match event.reply_details {
            Some(details) => self.route_tagged(inner, &event, details, settled),
            None => self.route_untagged(inner, &event, settled),
        }
    }

    fn route_tagged(
        &self,
        inner: &mut Inner,
        event: &BroadcastEvent,
        details: ReplyDetails,
        settled: &mut Settled,
    ) {
        let Some(&seq) = inner.by_id.get(&details.in_reply_to) else {
            // May belong to a call that is not registered yet.
            return;
        };
        inner.history.claim(event.id, details.in_reply_to);

        if details.is_failure() {
            let message = decode_error_message(&event.payload);
            self.settle(
                inner,
                seq,
                Err(CallError::Business {
                    status_code: details.status_code,
                    message,
                }),
                settled,
            );
        } else {
            self.acknowledge(inner, seq, event.id, settled);
        }
    }

    fn route_untagged(&self, inner: &mut Inner, event: &BroadcastEvent, settled: &mut Settled) {
        if event.source != self.config.program {
            return;
        }

        let mut reply: Option<(u64, ProgramReply)> = None;
        let mut first_unacked: Option<u64> = None;
        let mut decode_failure: Option<(u64, CodecError)> = None;

        for (seq, call) in &inner.calls {
            if !call.accepts_untagged(event.id) {
                continue;
            }
            if call.early_reply.is_none() {
                match call.decoder.decode(&event.payload) {
                    Ok(Some(decoded)) => {
                        reply = Some((*seq, decoded));
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        if call.ack.is_some() && decode_failure.is_none() {
                            decode_failure = Some((*seq, e));
                        }
                    }
                }
            }
            if call.ack.is_none() && first_unacked.is_none() {
                first_unacked = Some(*seq);
            }
        }

        if let Some((seq, decoded)) = reply {
            self.accept_reply(inner, seq, event.id, decoded, settled);
        } else if let Some(seq) = first_unacked {
            if let Some(owner) = inner.calls.get(&seq).map(|c| c.correlation_id) {
                inner.history.claim(event.id, owner);
            }
            self.acknowledge(inner, seq, event.id, settled);
        } else if let Some((seq, e)) = decode_failure {
            if let Some(owner) = inner.calls.get(&seq).map(|c| c.correlation_id) {
                inner.history.claim(event.id, owner);
            }
            self.settle(inner, seq, Err(CallError::Decode(e)), settled);
        }
    }

    fn accept_reply(
        &self,
        inner: &mut Inner,
        seq: u64,
        event_id: EventId,
        reply: ProgramReply,
        settled: &mut Settled,
    ) {
        let Some(call) = inner.calls.get_mut(&seq) else {
            return;
        };
        let owner = call.correlation_id;
        if call.ack.is_some() {
            inner.history.claim(event_id, owner);
            self.settle(inner, seq, Ok(Resolution::Reply(reply)), settled);
        } else {
            debug!(
                correlation_id = %owner,
                event_id = %event_id,
                variant = %reply.variant,
                "Business reply arrived before acknowledgement"
            );
            call.early_reply = Some((event_id, reply));
            inner.history.claim(event_id, owner);
        }
    }

    fn acknowledge(&self, inner: &mut Inner, seq: u64, event_id: EventId, settled: &mut Settled) {
        let Some(call) = inner.calls.get_mut(&seq) else {
            return;
        };
        if call.ack.is_some() {
            debug!(correlation_id = %call.correlation_id, event_id = %event_id, "Repeated acknowledgement ignored");
            return;
        }
        call.ack = Some(event_id);
        call.transition(CallState::Acknowledged);
        debug!(correlation_id = %call.correlation_id, event_id = %event_id, "Call acknowledged");

        if let Some((_, reply)) = call.early_reply.take() {
            self.settle(inner, seq, Ok(Resolution::Reply(reply)), settled);
        } else if !call.expect_reply {
            self.settle(inner, seq, Ok(Resolution::Acknowledged), settled);
        }
    }

    /// Remove the call and deliver its outcome.
    fn settle(
        &self,
        inner: &mut Inner,
        seq: u64,
        outcome: CallOutcome,
        settled: &mut Settled,
    ) -> Option<CorrelationId> {
        let mut call = inner.calls.remove(&seq)?;
        inner.by_id.remove(&call.correlation_id);
        let id = call.correlation_id;

        let next = match &outcome {
            Ok(_) => CallState::Resolved,
            Err(CallError::Timeout { .. }) => CallState::TimedOut,
            Err(_) => CallState::Failed,
        };
        let from = call.state;
        if !call.transition(next) {
            warn!(correlation_id = %id, from = %from, to = %next, "Call settled along unexpected edge");
        }

        let elapsed_ms = call.created_at.elapsed().as_millis() as u64;
        match &outcome {
            Ok(resolution) => {
                self.stats.resolved.fetch_add(1, Ordering::Relaxed);
                info!(
                    correlation_id = %id,
                    variant = resolution.reply().map_or("acknowledged", |r| r.variant.as_str()),
                    elapsed_ms,
                    "Call resolved"
                );
            }
            Err(CallError::Timeout { retries }) => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(correlation_id = %id, retries, elapsed_ms, "Call timed out");
            }
            Err(e @ CallError::Decode(_)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                error!(correlation_id = %id, error = %e, "Call rejected");
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(correlation_id = %id, error = %e, "Call rejected");
            }
        }

        if let Some(sender) = call.sender.take() {
            if sender.send(outcome.clone()).is_err() {
                debug!(correlation_id = %id, "Outcome receiver dropped");
            }
        }
        settled.push((id, outcome));
        Some(id)
    }

    fn publish(&self, inner: &Inner) {
        let next = PendingSet {
            calls: inner.calls.values().map(PendingCall::summary).collect(),
        };
        self.pending_tx.send_if_modified(|current| {
            if **current == next {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        });
    }

    fn notify(&self, settled: &Settled) {
        if settled.is_empty() {
            return;
        }
        let observers = self.observers.read().clone();
        for (id, outcome) in settled {
            for observer in &observers {
                observer.on_settled(*id, outcome);
            }
        }
    }
}
