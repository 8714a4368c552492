//! Current-snapshot cell.
//!
//! Holds the latest published snapshot behind a `watch` channel. Publishing
//! replaces the `Arc` wholesale; readers never observe a half-built value.

use super::snapshot::StateSnapshot;
use crate::error::AggregateError;
use ds_01_metadata_codec::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Published snapshot, `None` until the first successful cycle.
pub type SnapshotRef = Option<Arc<StateSnapshot>>;

#[derive(Debug)]
pub struct SnapshotCell {
    tx: watch::Sender<SnapshotRef>,
}

impl SnapshotCell {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    #[must_use]
    pub fn current(&self) -> SnapshotRef {
        self.tx.borrow().clone()
    }

    /// Version of the current snapshot, zero before the first publish.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |s| s.version)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SnapshotRef> {
        self.tx.subscribe()
    }

    /// Publish `parts` as version `base + 1`, unless the cell has moved
    /// past `base` in the meantime.
    pub fn publish_after(
        &self,
        base: u64,
        parts: BTreeMap<String, Value>,
    ) -> Result<Arc<StateSnapshot>, AggregateError> {
        let mut outcome = Err(AggregateError::Superseded { base, current: base });
        self.tx.send_if_modified(|current| {
            let version = current.as_ref().map_or(0, |s| s.version);
            if version != base {
                outcome = Err(AggregateError::Superseded {
                    base,
                    current: version,
                });
                return false;
            }
            let snapshot = Arc::new(StateSnapshot::new(base + 1, parts));
            *current = Some(snapshot.clone());
            outcome = Ok(snapshot);
            true
        });
        outcome
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}
