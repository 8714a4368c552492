//! Service layer: aggregation cycles and reconciliation.

pub mod aggregator;
pub mod reconciler;

pub use aggregator::{AggregatorStats, StateSnapshotAggregator};
pub use reconciler::{ReconcileStats, Reconciler};
