//! # Reconciliation Diff
//!
//! Pure comparison of two snapshots into UI side effects.
//!
//! | Signal | Effect |
//! |--------|--------|
//! | phase moved along a table edge | `PhaseChanged` + the edge's effect |
//! | phase moved off the table | violation, no effect |
//! | countdown value changed | `RestartCountdown` |
//! | pairing index fell outside the pairing collection | `ResetPairing { to: 0 }` |
//! | overlay gone, or left over from the previous phase | `ClearOverlay` |
//!
//! Only `next` feeds the output; `prev` is read, never changed.

use super::phase::{phase_name, EdgeEffect, PhaseTable, PhaseViolation};
use super::snapshot::{FieldPath, StateSnapshot};
use ds_01_metadata_codec::Value;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where the reconciled signals live in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSpec {
    pub phase: Option<FieldPath>,
    pub pairing_index: Option<FieldPath>,
    pub pairings: Option<FieldPath>,
    pub overlay: Option<FieldPath>,
    pub countdown: Option<FieldPath>,
}

impl ReconcileSpec {
    #[must_use]
    pub fn with_phase(mut self, path: FieldPath) -> Self {
        self.phase = Some(path);
        self
    }

    /// Track an index into a collection; both paths are required.
    #[must_use]
    pub fn with_pairing(mut self, index: FieldPath, collection: FieldPath) -> Self {
        self.pairing_index = Some(index);
        self.pairings = Some(collection);
        self
    }

    #[must_use]
    pub fn with_overlay(mut self, path: FieldPath) -> Self {
        self.overlay = Some(path);
        self
    }

    #[must_use]
    pub fn with_countdown(mut self, path: FieldPath) -> Self {
        self.countdown = Some(path);
        self
    }
}

/// Effect the UI should apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffect {
    NavigateToLobby,
    /// `deadline` is the countdown value of the new snapshot, if numeric.
    RestartCountdown { deadline: Option<u64> },
    ResetPairing { to: u64 },
    ClearOverlay,
    PhaseChanged { from: String, to: String },
}

/// Output of one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub effects: Vec<SideEffect>,
    pub violations: Vec<PhaseViolation>,
}

impl Reconciliation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.violations.is_empty()
    }

    fn push(&mut self, effect: SideEffect) {
        if !self.effects.contains(&effect) {
            self.effects.push(effect);
        }
    }

    fn has_countdown(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, SideEffect::RestartCountdown { .. }))
    }
}

/// Diff `prev` against `next`.
#[must_use]
pub fn reconcile(
    table: &PhaseTable,
    spec: &ReconcileSpec,
    prev: Option<&StateSnapshot>,
    next: &StateSnapshot,
) -> Reconciliation {
    let mut out = Reconciliation::default();
    let deadline = resolve(next, spec.countdown.as_ref()).and_then(Value::as_u64);

    // Phase
    let next_phase = resolve(next, spec.phase.as_ref()).and_then(phase_name);
    let prev_phase = prev
        .and_then(|p| resolve(p, spec.phase.as_ref()))
        .and_then(phase_name);
    let mut phase_moved = false;
    match (prev_phase, next_phase) {
        (Some(from), Some(to)) if from != to => match table.check(from, to) {
            Ok(effect) => {
                phase_moved = true;
                out.push(SideEffect::PhaseChanged {
                    from: from.to_string(),
                    to: to.to_string(),
                });
                match effect {
                    EdgeEffect::None => {}
                    EdgeEffect::RestartCountdown => out.push(SideEffect::RestartCountdown { deadline }),
                    EdgeEffect::NavigateToLobby => out.push(SideEffect::NavigateToLobby),
                    EdgeEffect::ClearOverlay => out.push(SideEffect::ClearOverlay),
                }
            }
            Err(violation) => {
                warn!(from, to, version = next.version, error = %violation, "Invalid phase transition");
                out.violations.push(violation);
            }
        },
        (None, Some(to)) if !table.is_known(to) => {
            let violation = PhaseViolation::UnknownPhase(to.to_string());
            warn!(to, version = next.version, error = %violation, "Invalid initial phase");
            out.violations.push(violation);
        }
        _ => {}
    }

    // Countdown
    if let Some(prev) = prev {
        let before = resolve(prev, spec.countdown.as_ref());
        let after = resolve(next, spec.countdown.as_ref());
        if after.is_some() && before != after && !out.has_countdown() {
            out.push(SideEffect::RestartCountdown { deadline });
        }
    }

    // Pairing
    let stale_now = pairing_is_stale(spec, next);
    let stale_before = prev.is_some_and(|p| pairing_is_stale(spec, p));
    if stale_now && !stale_before {
        out.push(SideEffect::ResetPairing { to: 0 });
    }

    // Overlay
    if let Some(prev) = prev {
        let before = present(resolve(prev, spec.overlay.as_ref()));
        let after = present(resolve(next, spec.overlay.as_ref()));
        if before.is_some() && (after.is_none() || (phase_moved && after == before)) {
            out.push(SideEffect::ClearOverlay);
        }
    }

    out
}

fn resolve<'a>(snapshot: &'a StateSnapshot, path: Option<&FieldPath>) -> Option<&'a Value> {
    snapshot.resolve(path?)
}

/// A value that carries information, with `Some` wrappers removed.
fn present(value: Option<&Value>) -> Option<&Value> {
    value
        .and_then(Value::flatten_option)
        .filter(|v| !v.is_empty())
}

fn pairing_is_stale(spec: &ReconcileSpec, snapshot: &StateSnapshot) -> bool {
    let Some(index) = resolve(snapshot, spec.pairing_index.as_ref()).and_then(Value::as_u64) else {
        return false;
    };
    let len = resolve(snapshot, spec.pairings.as_ref())
        .and_then(Value::len)
        .unwrap_or(0);
    usize::try_from(index).map_or(true, |i| i >= len)
}
