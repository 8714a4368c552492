//! # Session Scheduler
//!
//! One task drives the whole session. Each turn of the loop handles exactly
//! one of:
//!
//! - shutdown signal (or the handle going away)
//! - account switch
//! - next tap item: events go to the correlator, `Resync` triggers a refresh
//! - pending-set change, mirrored into the store
//! - refresh request (a call settled, or the host asked)
//! - state-change notice naming the program
//! - retry tick (`ReplyCorrelator::tick`)
//! - poll tick (aggregation + reconciliation)
//!
//! Every handler runs to completion before the next item is taken, so
//! aggregation cycles never overlap.

use crate::container::EngineStore;
use ds_02_reply_correlator::{EventTap, ReplyCorrelator, TapItem};
use ds_04_state_sync::{AggregateError, Reconciler, SideEffect, StateSnapshotAggregator};
use ds_telemetry::{
    HistogramTimer, CALLS_PENDING, EVENTS_TAPPED, PHASE_VIOLATIONS, SIDE_EFFECTS,
    SNAPSHOT_CYCLES, SNAPSHOT_CYCLE_DURATION, SNAPSHOT_VERSION,
};
use shared_types::entities::{ActorId, SessionId};
use shared_types::ledger::LedgerTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Signals the handle sends to the scheduler.
pub(crate) struct SchedulerControl {
    pub shutdown: watch::Receiver<bool>,
    pub account: watch::Receiver<Option<ActorId>>,
    pub refresh: Arc<Notify>,
}

pub(crate) struct Scheduler {
    pub session: SessionId,
    pub program: ActorId,
    pub transport: Arc<dyn LedgerTransport>,
    pub tap: EventTap,
    pub correlator: Arc<ReplyCorrelator>,
    pub aggregator: Arc<StateSnapshotAggregator>,
    pub reconciler: Reconciler,
    pub store: Arc<EngineStore>,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
}

impl Scheduler {
    pub async fn run(mut self, mut control: SchedulerControl) {
        let (change_tx, mut changes) = mpsc::unbounded_channel();
        let unsubscribe_changes = match self.transport.subscribe_state_changes(change_tx) {
            Ok(unsubscribe) => Some(unsubscribe),
            Err(e) => {
                warn!(session = %self.session, error = %e, "State-change notices unavailable, polling only");
                None
            }
        };
        let mut changes_live = unsubscribe_changes.is_some();
        let mut tap_live = true;
        let mut account_live = true;
        let mut pending = self.correlator.subscribe_pending();

        // First poll tick fires immediately and produces the initial snapshot.
        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retry = interval_at(Instant::now() + self.retry_interval, self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(session = %self.session, program = %self.program, "Session scheduler running");

        loop {
            tokio::select! {
                biased;

                _ = control.shutdown.changed() => {
                    break;
                }

                changed = control.account.changed(), if account_live => {
                    if changed.is_err() {
                        account_live = false;
                        continue;
                    }
                    let account = *control.account.borrow_and_update();
                    self.tap.set_account(account);
                    self.reconciler.reset();
                    info!(session = %self.session, account = ?account, "Account switched");
                    self.refresh("account").await;
                }

                item = self.tap.next(), if tap_live => match item {
                    Ok(TapItem::Event(event)) => {
                        EVENTS_TAPPED.inc();
                        self.correlator.ingest(event);
                    }
                    Ok(TapItem::Resync) => {
                        info!(session = %self.session, "Broadcast stream resumed without replay, refreshing");
                        self.refresh("resync").await;
                    }
                    Err(e) => {
                        // Calls still time out and snapshots still poll.
                        error!(session = %self.session, error = %e, "Event tap stopped");
                        tap_live = false;
                    }
                },

                changed = pending.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let set = pending.borrow_and_update().clone();
                    CALLS_PENDING.set(i64::try_from(set.len()).unwrap_or(i64::MAX));
                    self.store.set_pending(set);
                }

                _ = control.refresh.notified() => {
                    self.refresh("settled").await;
                }

                change = changes.recv(), if changes_live => match change {
                    Some(change) if change.touches(&self.program) => {
                        debug!(block = change.block, "Program state changed");
                        self.refresh("state_change").await;
                    }
                    Some(_) => {}
                    None => changes_live = false,
                },

                _ = retry.tick() => {
                    let timed_out = self.correlator.tick();
                    if !timed_out.is_empty() {
                        warn!(session = %self.session, count = timed_out.len(), "Calls timed out");
                    }
                }

                _ = poll.tick() => {
                    self.refresh("poll").await;
                }
            }
        }

        self.stop(unsubscribe_changes);
    }

    /// One aggregation cycle followed by reconciliation.
    ///
    /// A failed or superseded cycle leaves the published snapshot and the
    /// reconciler untouched.
    async fn refresh(&mut self, trigger: &'static str) {
        let _timer = HistogramTimer::new(&SNAPSHOT_CYCLE_DURATION);
        match self.aggregator.refresh().await {
            Ok(snapshot) => {
                SNAPSHOT_CYCLES.with_label_values(&["ok"]).inc();
                SNAPSHOT_VERSION.set(i64::try_from(snapshot.version).unwrap_or(i64::MAX));

                let out = self.reconciler.observe(snapshot);
                PHASE_VIOLATIONS.inc_by(out.violations.len() as u64);
                for effect in out.effects {
                    SIDE_EFFECTS.with_label_values(&[effect_label(&effect)]).inc();
                    self.store.emit(effect);
                }
            }
            Err(e @ AggregateError::Superseded { .. }) => {
                SNAPSHOT_CYCLES.with_label_values(&["superseded"]).inc();
                debug!(trigger, error = %e, "Refresh superseded");
            }
            Err(e) => {
                SNAPSHOT_CYCLES.with_label_values(&["failed"]).inc();
                debug!(trigger, reason = e.reason(), "Refresh failed, previous snapshot kept");
            }
        }
    }

    fn stop(&mut self, unsubscribe_changes: Option<shared_types::ledger::Unsubscribe>) {
        self.tap.close();
        if let Some(unsubscribe) = unsubscribe_changes {
            unsubscribe();
        }
        let abandoned = self.correlator.abandon_all();
        self.store.set_pending(self.correlator.pending());
        CALLS_PENDING.set(0);
        info!(session = %self.session, abandoned, "Session scheduler stopped");
    }
}

fn effect_label(effect: &SideEffect) -> &'static str {
    match effect {
        SideEffect::NavigateToLobby => "navigate_to_lobby",
        SideEffect::RestartCountdown { .. } => "restart_countdown",
        SideEffect::ResetPairing { .. } => "reset_pairing",
        SideEffect::ClearOverlay => "clear_overlay",
        SideEffect::PhaseChanged { .. } => "phase_changed",
    }
}
