//! Running sessions: the scheduler drives tap, retries and aggregation.

use super::fixtures::*;
use ds_03_action_dispatch::{DispatchError, StaticSigner};
use ds_04_state_sync::{SideEffect, SnapshotRef};
use futures::future::join_all;
use session_runtime::{launch_from_env, SessionHandle};
use shared_bus::InMemoryLedger;
use shared_types::entities::CorrelationId;
use shared_types::errors::RejectReason;
use shared_types::ledger::{LedgerTransport, SignedAction};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

async fn wait_for_version(rx: &mut watch::Receiver<SnapshotRef>, version: u64) -> u64 {
    let snapshot = timeout(
        WAIT,
        rx.wait_for(|s| s.as_ref().is_some_and(|s| s.version >= version)),
    )
    .await
    .unwrap()
    .unwrap();
    snapshot.as_ref().map_or(0, |s| s.version)
}

async fn started(ledger: &Arc<InMemoryLedger>) -> (SessionHandle, watch::Receiver<SnapshotRef>) {
    let handle = session(ledger, quiet_config()).start().await.unwrap();
    let mut snapshots = handle.subscribe_snapshots();
    wait_for_version(&mut snapshots, 1).await;
    (handle, snapshots)
}

#[tokio::test]
async fn test_dispatch_resolves_through_running_session() {
    let ledger = seeded_ledger(&GameState::default());
    ledger.respond_with(Box::new(|_action: &SignedAction, id: CorrelationId| {
        vec![ack(id), business_reply(moved_payload(7))]
    }));
    let handle = session(&ledger, fast_config()).start().await.unwrap();

    let call = handle
        .dispatch_action(&move_action(7), handle.default_options())
        .await
        .unwrap();
    let resolution = timeout(WAIT, call.outcome).await.unwrap().unwrap();
    let reply = resolution.reply().unwrap();
    assert_eq!(reply.variant, "Moved");
    assert_eq!(reply.field("cell").and_then(|v| v.as_u64()), Some(7));

    let mut pending = handle.pending();
    timeout(WAIT, pending.wait_for(|set| set.is_empty()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ledger.submitted().len(), 1);
    assert_eq!(ledger.gas_requests(), 1);

    let metrics = ds_telemetry::gather().unwrap();
    assert!(metrics.contains("ds_dispatch_calls_dispatched_total"));
    assert!(metrics.contains("ds_correlator_calls_resolved_total"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_dispatches_each_resolve() {
    let ledger = seeded_ledger(&GameState::default());
    ledger.respond_with(Box::new(|action: &SignedAction, id: CorrelationId| {
        let cell = action.action.payload.last().copied().unwrap_or_default();
        vec![business_reply(moved_payload(cell)), ack(id)]
    }));
    let (handle, _) = started(&ledger).await;

    let calls = join_all((0..5u8).map(|cell| {
        let handle = &handle;
        async move {
            handle
                .dispatch_action(&move_action(cell), handle.default_options())
                .await
        }
    }))
    .await;
    let outcomes = join_all(calls.into_iter().map(|call| async move {
        timeout(WAIT, call.unwrap().outcome).await.unwrap()
    }))
    .await;

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, Ok(r) if r.reply().is_some_and(|r| r.variant == "Moved"))));
    assert_eq!(handle.correlator().pending_count(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_submission_leaves_nothing_pending() {
    let ledger = seeded_ledger(&GameState::default());
    ledger.reject_next(RejectReason::InvalidSignature);
    let (handle, _) = started(&ledger).await;

    let err = handle
        .dispatch_action(&move_action(1), handle.default_options())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::SubmissionRejected(_)));
    assert_eq!(handle.correlator().pending_count(), 0);
    assert!(ds_telemetry::gather()
        .unwrap()
        .contains("ds_dispatch_failures_total"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_silent_call_times_out_under_scheduler() {
    let ledger = seeded_ledger(&GameState::default());
    let (handle, _) = started(&ledger).await;

    let call = handle
        .dispatch_action(&move_action(2), handle.default_options().with_retries(2))
        .await
        .unwrap();
    let outcome = timeout(WAIT, call.outcome).await.unwrap();
    assert!(matches!(
        outcome,
        Err(ds_02_reply_correlator::CallError::Timeout { retries: 2 })
    ));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stream_loss_without_replay_triggers_resync() {
    let ledger = Arc::new(InMemoryLedger::without_replay());
    GameState::default().write(&ledger);
    let (handle, mut snapshots) = started(&ledger).await;

    ledger.drop_subscribers();
    assert!(wait_for_version(&mut snapshots, 2).await >= 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_state_change_for_program_triggers_refresh() {
    let ledger = seeded_ledger(&GameState::default());
    let (handle, mut snapshots) = started(&ledger).await;

    ledger.emit_state_change(vec![STRANGER]);
    ledger.emit_state_change(vec![PROGRAM]);
    assert_eq!(wait_for_version(&mut snapshots, 2).await, 2);

    // The stranger's notice did not add a cycle of its own.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.aggregator().cell().version(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lobby_navigation_reaches_subscribers() {
    let mut state = GameState {
        phase: "Over",
        ..GameState::default()
    };
    let ledger = seeded_ledger(&state);
    let (handle, mut snapshots) = started(&ledger).await;
    let mut effects = handle.side_effects();

    state.phase = "Registration";
    state.write(&ledger);
    handle.request_refresh();
    wait_for_version(&mut snapshots, 2).await;

    let mut seen = Vec::new();
    while !seen.contains(&SideEffect::NavigateToLobby) {
        seen.push(timeout(WAIT, effects.recv()).await.unwrap().unwrap());
    }
    assert_eq!(
        seen,
        vec![
            SideEffect::PhaseChanged {
                from: "Over".into(),
                to: "Registration".into(),
            },
            SideEffect::NavigateToLobby,
        ]
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_account_switch_abandons_previous_calls() {
    let ledger = seeded_ledger(&GameState::default());
    let (handle, _) = started(&ledger).await;

    let call = handle
        .dispatch_action(&move_action(3), handle.default_options())
        .await
        .unwrap();
    assert_eq!(handle.switch_account(Some(Arc::new(StaticSigner::new(STRANGER)))), 1);
    assert_eq!(
        timeout(WAIT, call.outcome).await.unwrap(),
        Err(ds_02_reply_correlator::CallError::Abandoned)
    );

    // The new identity can dispatch straight away.
    let next = handle
        .dispatch_action(&move_action(4), handle.default_options())
        .await
        .unwrap();
    assert!(handle.correlator().is_pending(&next.correlation_id));
    assert_eq!(
        ledger.submitted().last().map(|a| a.action.source),
        Some(STRANGER)
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_launch_from_environment() {
    let ledger = seeded_ledger(&GameState::default());
    let mut blob = tempfile::NamedTempFile::new().unwrap();
    write!(blob, "{}", metadata().to_hex().unwrap()).unwrap();

    std::env::set_var("DS_PROGRAM_ID", PROGRAM.to_hex());
    std::env::set_var("DS_METADATA_PATH", blob.path());
    std::env::set_var("DS_POLL_INTERVAL_MS", "40");
    std::env::set_var("DS_LOG_LEVEL", "warn");

    let transport: Arc<dyn LedgerTransport> = ledger.clone();
    let launched = launch_from_env(transport, |session| {
        session
            .with_signer(Arc::new(StaticSigner::new(PLAYER)))
            .with_reads(reads())
            .with_reconcile(reconcile_spec())
    })
    .await
    .unwrap();

    let handle = launched.session;
    assert_eq!(handle.program(), PROGRAM);
    let mut snapshots = handle.subscribe_snapshots();
    wait_for_version(&mut snapshots, 1).await;
    assert!(handle.is_running());

    handle.shutdown().await.unwrap();
    drop(launched.telemetry);
}
