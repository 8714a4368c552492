//! Aggregation and reconciliation against seeded ledger state.

use super::fixtures::*;
use ds_04_state_sync::{
    AggregateError, PhaseTable, PhaseViolation, Reconciler, SideEffect, SnapshotCell,
    StateSnapshotAggregator,
};
use shared_bus::InMemoryLedger;
use shared_types::ledger::LedgerTransport;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn aggregator(ledger: &Arc<InMemoryLedger>) -> StateSnapshotAggregator {
    let transport: Arc<dyn LedgerTransport> = ledger.clone();
    StateSnapshotAggregator::new(transport, codec(), Arc::new(SnapshotCell::new()), reads())
}

fn reconciler() -> Reconciler {
    Reconciler::new(PhaseTable::default(), reconcile_spec())
}

#[tokio::test]
async fn test_snapshot_holds_every_part() {
    let ledger = seeded_ledger(&GameState::default());
    let snapshot = aggregator(&ledger).refresh().await.unwrap();

    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.names().count(), PARTS.len());
    assert_eq!(
        snapshot
            .part("status")
            .and_then(|s| s.field("phase"))
            .and_then(|p| p.variant_name()),
        Some("Registration")
    );
    assert_eq!(snapshot.part("players").and_then(|p| p.len()), Some(2));
    assert_eq!(snapshot.part("round").and_then(|r| r.as_u64()), Some(1));
}

#[tokio::test]
async fn test_one_failed_read_discards_the_cycle() {
    let mut state = GameState::default();
    let ledger = seeded_ledger(&state);
    let aggregator = aggregator(&ledger);
    let first = aggregator.refresh().await.unwrap();

    ledger.fail_read(query("round"));
    state.round = 2;
    state.write(&ledger);

    match aggregator.refresh().await {
        Err(AggregateError::Read { part, .. }) => assert_eq!(part, "round"),
        other => panic!("expected read failure, got {other:?}"),
    }
    assert_eq!(aggregator.cell().version(), 1);
    assert_eq!(aggregator.cell().current(), Some(first));
    assert_eq!(aggregator.stats().failed.load(Ordering::Relaxed), 1);
    // All five reads were issued in both cycles.
    assert_eq!(ledger.read_count(), 10);

    ledger.restore_read(&query("round"));
    let next = aggregator.refresh().await.unwrap();
    assert_eq!(next.version, 2);
    assert_eq!(next.part("round").and_then(|r| r.as_u64()), Some(2));
}

#[tokio::test]
async fn test_over_to_registration_navigates_once() {
    let mut state = GameState {
        phase: "Over",
        ..GameState::default()
    };
    let ledger = seeded_ledger(&state);
    let aggregator = aggregator(&ledger);
    let reconciler = reconciler();

    let first = reconciler.observe(aggregator.refresh().await.unwrap());
    assert!(first.is_empty());

    state.phase = "Registration";
    state.write(&ledger);
    let moved = reconciler.observe(aggregator.refresh().await.unwrap());
    let navigations = moved
        .effects
        .iter()
        .filter(|e| **e == SideEffect::NavigateToLobby)
        .count();
    assert_eq!(navigations, 1);
    assert!(moved.effects.contains(&SideEffect::PhaseChanged {
        from: "Over".into(),
        to: "Registration".into(),
    }));

    let unchanged = reconciler.observe(aggregator.refresh().await.unwrap());
    assert!(unchanged.is_empty());
    assert_eq!(aggregator.cell().version(), 3);
}

#[tokio::test]
async fn test_stale_pairing_resets_once() {
    let mut state = GameState {
        phase: "Active",
        ..GameState::default()
    };
    let ledger = seeded_ledger(&state);
    let aggregator = aggregator(&ledger);
    let reconciler = reconciler();
    reconciler.observe(aggregator.refresh().await.unwrap());

    state.players = vec!["ada"];
    state.pairing = 1;
    state.write(&ledger);
    assert_eq!(
        reconciler.observe(aggregator.refresh().await.unwrap()).effects,
        vec![SideEffect::ResetPairing { to: 0 }]
    );
    assert!(reconciler
        .observe(aggregator.refresh().await.unwrap())
        .is_empty());
}

#[tokio::test]
async fn test_overlay_left_from_previous_phase_is_cleared() {
    let mut state = GameState {
        phase: "Active",
        overlay: Some("hit for 12"),
        ..GameState::default()
    };
    let ledger = seeded_ledger(&state);
    let aggregator = aggregator(&ledger);
    let reconciler = reconciler();
    reconciler.observe(aggregator.refresh().await.unwrap());

    state.phase = "Resolving";
    state.write(&ledger);
    let out = reconciler.observe(aggregator.refresh().await.unwrap());
    assert!(out.effects.contains(&SideEffect::ClearOverlay));
}

#[tokio::test]
async fn test_skipped_phase_is_reported_not_applied() {
    let mut state = GameState::default();
    let ledger = seeded_ledger(&state);
    let aggregator = aggregator(&ledger);
    let reconciler = reconciler();
    reconciler.observe(aggregator.refresh().await.unwrap());

    state.phase = "Over";
    state.write(&ledger);
    let out = reconciler.observe(aggregator.refresh().await.unwrap());
    assert!(out.effects.is_empty());
    assert_eq!(
        out.violations,
        vec![PhaseViolation::NoEdge {
            from: "Registration".into(),
            to: "Over".into(),
        }]
    );
    assert_eq!(reconciler.stats().violations.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_countdown_change_restarts_timer() {
    let mut state = GameState {
        phase: "Active",
        ..GameState::default()
    };
    let ledger = seeded_ledger(&state);
    let aggregator = aggregator(&ledger);
    let reconciler = reconciler();
    reconciler.observe(aggregator.refresh().await.unwrap());

    state.deadline = 480;
    state.write(&ledger);
    assert_eq!(
        reconciler.observe(aggregator.refresh().await.unwrap()).effects,
        vec![SideEffect::RestartCountdown {
            deadline: Some(480)
        }]
    );
}
