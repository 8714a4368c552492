//! Dispatch, tap and correlator wired by hand over the in-memory ledger.

use super::fixtures::*;
use ds_02_reply_correlator::{
    CallError, CorrelatorConfig, EventTap, ReplyCorrelator, Resolution, TapConfig, TapItem,
};
use ds_03_action_dispatch::{
    ActionDispatcher, DispatchOptions, DispatchedCall, DispatcherConfig, StaticSigner,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared_bus::{InMemoryLedger, LogMessage};
use shared_types::entities::SessionId;
use shared_types::ledger::LedgerTransport;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_test::{assert_pending, assert_ready};

struct Harness {
    ledger: Arc<InMemoryLedger>,
    correlator: Arc<ReplyCorrelator>,
    dispatcher: ActionDispatcher,
    tap: EventTap,
}

impl Harness {
    fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let transport: Arc<dyn LedgerTransport> = ledger.clone();
        let correlator = Arc::new(ReplyCorrelator::new(CorrelatorConfig::new(PROGRAM)));

        let dispatcher = ActionDispatcher::new(
            DispatcherConfig::default(),
            SessionId::new(),
            transport.clone(),
            correlator.clone(),
        );
        dispatcher.set_codec(codec()).unwrap();
        dispatcher.set_signer(Some(Arc::new(StaticSigner::new(PLAYER))));

        let mut tap = EventTap::new(transport, TapConfig::new(PROGRAM));
        tap.open().unwrap();

        Self {
            ledger,
            correlator,
            dispatcher,
            tap,
        }
    }

    async fn dispatch(&self, options: DispatchOptions) -> DispatchedCall {
        self.dispatcher
            .dispatch(PROGRAM, &move_action(4), options)
            .await
            .unwrap()
    }

    /// Move `count` tapped events into the correlator.
    async fn pump(&mut self, count: usize) {
        for _ in 0..count {
            match timeout(WAIT, self.tap.next()).await.unwrap().unwrap() {
                TapItem::Event(event) => {
                    self.correlator.ingest(event);
                }
                TapItem::Resync => panic!("unexpected resync"),
            }
        }
    }
}

#[tokio::test]
async fn test_unrelated_ack_then_reply_resolves_once() {
    let mut h = Harness::new();
    let call = h.dispatch(DispatchOptions::default()).await;
    let id = call.correlation_id;

    h.ledger.emit(LogMessage::new(STRANGER, PROGRAM, vec![0x01, 0x02]));
    h.ledger.emit(ack(id));
    h.ledger.emit(business_reply(moved_payload(4)));
    h.pump(3).await;

    let resolution = timeout(WAIT, call.outcome).await.unwrap().unwrap();
    let reply = resolution.reply().unwrap();
    assert_eq!(reply.variant, "Moved");
    assert_eq!(reply.field("cell").and_then(|v| v.as_u64()), Some(4));
    assert_eq!(h.correlator.stats().resolved.load(Ordering::Relaxed), 1);
    assert!(h.correlator.pending().is_empty());

    // The same messages again settle nothing.
    h.ledger.emit(ack(id));
    h.ledger.emit(business_reply(moved_payload(4)));
    h.pump(2).await;
    assert_eq!(h.correlator.stats().resolved.load(Ordering::Relaxed), 1);
    assert_eq!(h.correlator.stats().rejected.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_tagged_failure_rejects_without_spending_retries() {
    let mut h = Harness::new();
    let call = h.dispatch(DispatchOptions::default().with_retries(2)).await;

    h.ledger.emit(failure(call.correlation_id, "not your turn"));
    h.pump(1).await;

    match timeout(WAIT, call.outcome).await.unwrap() {
        Err(CallError::Business {
            status_code,
            message,
        }) => {
            assert_eq!(status_code, 1);
            assert_eq!(message, "not your turn");
        }
        other => panic!("expected business failure, got {other:?}"),
    }

    for _ in 0..4 {
        assert!(h.correlator.tick().is_empty());
    }
    assert_eq!(h.correlator.stats().timed_out.load(Ordering::Relaxed), 0);
    assert_eq!(h.correlator.pending_count(), 0);
}

#[tokio::test]
async fn test_silent_call_times_out_after_retry_budget() {
    let h = Harness::new();
    let mut call = h.dispatch(DispatchOptions::default().with_retries(3)).await;
    let id = call.correlation_id;

    assert!(h.correlator.tick().is_empty());
    assert!(h.correlator.tick().is_empty());
    assert!(call.outcome.try_outcome().is_none());
    assert!(h.correlator.is_pending(&id));

    assert_eq!(h.correlator.tick(), vec![id]);
    assert_eq!(
        call.outcome.try_outcome(),
        Some(Err(CallError::Timeout { retries: 3 }))
    );
    assert!(!h.correlator.pending().contains(&id));
}

#[tokio::test]
async fn test_outcome_stays_pending_until_reply() {
    let mut h = Harness::new();
    let call = h.dispatch(DispatchOptions::default()).await;
    let id = call.correlation_id;
    let mut outcome = tokio_test::task::spawn(call.outcome);

    assert_pending!(outcome.poll());

    // Acknowledged but still waiting for the business reply.
    h.ledger.emit(ack(id));
    h.pump(1).await;
    assert_pending!(outcome.poll());
    assert!(h.correlator.pending().get(&id).is_some());

    h.ledger.emit(business_reply(moved_payload(1)));
    h.pump(1).await;
    assert!(outcome.is_woken());
    let resolution = assert_ready!(outcome.poll()).unwrap();
    assert!(matches!(resolution, Resolution::Reply(_)));
}

#[tokio::test]
async fn test_ack_only_call_settles_on_acknowledgement() {
    let mut h = Harness::new();
    let call = h.dispatch(DispatchOptions::default().ack_only()).await;

    h.ledger.emit(ack(call.correlation_id));
    h.pump(1).await;

    let resolution = timeout(WAIT, call.outcome).await.unwrap().unwrap();
    assert_eq!(resolution, Resolution::Acknowledged);
}

#[tokio::test]
async fn test_shuffled_duplicated_delivery_settles_each_call_once() {
    const CALLS: usize = 6;
    let h = Harness::new();

    let mut calls = Vec::new();
    for _ in 0..CALLS {
        calls.push(h.dispatch(DispatchOptions::default()).await);
    }

    let mut events = Vec::new();
    for (cell, call) in calls.iter().enumerate() {
        events.push(h.ledger.emit(ack(call.correlation_id)));
        events.push(h.ledger.emit(business_reply(moved_payload(cell as u8))));
    }
    events.extend(events.clone());
    events.shuffle(&mut StdRng::seed_from_u64(0x5eed));

    let fresh = events
        .into_iter()
        .filter(|event| h.correlator.ingest(event.clone()))
        .count();
    assert_eq!(fresh, CALLS * 2);

    for call in &mut calls {
        match call.outcome.try_outcome() {
            Some(Ok(Resolution::Reply(reply))) => assert_eq!(reply.variant, "Moved"),
            other => panic!("call {} settled as {other:?}", call.correlation_id),
        }
    }
    let stats = h.correlator.stats();
    assert_eq!(stats.resolved.load(Ordering::Relaxed), CALLS as u64);
    assert_eq!(stats.duplicate_events.load(Ordering::Relaxed), CALLS as u64 * 2);
    assert!(h.correlator.pending().is_empty());
    assert!(h.correlator.tick().is_empty());
}

#[tokio::test]
async fn test_abandoned_session_yields_abandoned() {
    let mut h = Harness::new();
    let call = h.dispatch(DispatchOptions::default()).await;

    assert_eq!(h.correlator.abandon(h.dispatcher.session()), 1);
    assert_eq!(
        timeout(WAIT, call.outcome).await.unwrap(),
        Err(CallError::Abandoned)
    );

    // A late acknowledgement finds nothing to settle.
    h.ledger.emit(ack(call.correlation_id));
    h.pump(1).await;
    assert_eq!(h.correlator.stats().resolved.load(Ordering::Relaxed), 0);
}
