//! # Engine Store
//!
//! The state a host reads: pending calls, the current snapshot, and the side
//! effects derived from snapshot changes. A store is created by the host and
//! injected into a session, so observers can subscribe before the session
//! starts.

use ds_02_reply_correlator::PendingSet;
use ds_04_state_sync::{SideEffect, SnapshotCell, SnapshotRef};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Side effects buffered per slow subscriber before it starts lagging.
pub const DEFAULT_EFFECT_CAPACITY: usize = 64;

pub struct EngineStore {
    pending: watch::Sender<Arc<PendingSet>>,
    snapshots: Arc<SnapshotCell>,
    effects: broadcast::Sender<SideEffect>,
}

impl EngineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_effect_capacity(DEFAULT_EFFECT_CAPACITY)
    }

    #[must_use]
    pub fn with_effect_capacity(capacity: usize) -> Self {
        let (pending, _) = watch::channel(Arc::new(PendingSet::default()));
        let (effects, _) = broadcast::channel(capacity.max(1));
        Self {
            pending,
            snapshots: Arc::new(SnapshotCell::new()),
            effects,
        }
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<Arc<PendingSet>> {
        self.pending.subscribe()
    }

    #[must_use]
    pub fn pending(&self) -> Arc<PendingSet> {
        self.pending.borrow().clone()
    }

    /// The cell the aggregator publishes into.
    #[must_use]
    pub fn snapshots(&self) -> &Arc<SnapshotCell> {
        &self.snapshots
    }

    #[must_use]
    pub fn current_snapshot(&self) -> SnapshotRef {
        self.snapshots.current()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SnapshotRef> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_effects(&self) -> broadcast::Receiver<SideEffect> {
        self.effects.subscribe()
    }

    pub(crate) fn set_pending(&self, set: Arc<PendingSet>) {
        self.pending.send_replace(set);
    }

    /// Returns how many subscribers received the effect.
    pub(crate) fn emit(&self, effect: SideEffect) -> usize {
        // No subscribers is not an error.
        self.effects.send(effect).unwrap_or(0)
    }
}

impl Default for EngineStore {
    fn default() -> Self {
        Self::new()
    }
}
