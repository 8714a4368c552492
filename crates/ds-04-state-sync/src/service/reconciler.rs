//! Stateful front of the reconciliation diff.
//!
//! Keeps exactly one previous snapshot: each observed snapshot is diffed
//! against it and then replaces it.

use crate::domain::{reconcile, PhaseTable, ReconcileSpec, Reconciliation, StateSnapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciler statistics
#[derive(Debug, Default)]
pub struct ReconcileStats {
    /// Snapshots diffed
    pub cycles: AtomicU64,
    /// Side effects emitted
    pub effects: AtomicU64,
    /// Phase table violations
    pub violations: AtomicU64,
}

pub struct Reconciler {
    table: PhaseTable,
    spec: ReconcileSpec,
    last: Mutex<Option<Arc<StateSnapshot>>>,
    stats: ReconcileStats,
}

impl Reconciler {
    #[must_use]
    pub fn new(table: PhaseTable, spec: ReconcileSpec) -> Self {
        Self {
            table,
            spec,
            last: Mutex::new(None),
            stats: ReconcileStats::default(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &PhaseTable {
        &self.table
    }

    #[must_use]
    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }

    /// Diff `next` against the previously observed snapshot.
    ///
    /// A snapshot no newer than the last one yields nothing.
    pub fn observe(&self, next: Arc<StateSnapshot>) -> Reconciliation {
        let mut last = self.last.lock();
        if last.as_ref().is_some_and(|prev| next.version <= prev.version) {
            debug!(version = next.version, "Snapshot already reconciled");
            return Reconciliation::default();
        }

        let out = reconcile(&self.table, &self.spec, last.as_deref(), &next);
        *last = Some(next.clone());
        drop(last);

        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .effects
            .fetch_add(out.effects.len() as u64, Ordering::Relaxed);
        self.stats
            .violations
            .fetch_add(out.violations.len() as u64, Ordering::Relaxed);
        if !out.effects.is_empty() {
            info!(version = next.version, effects = ?out.effects, "Side effects derived");
        }
        out
    }

    /// Forget the previous snapshot, e.g. after an account switch.
    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}
