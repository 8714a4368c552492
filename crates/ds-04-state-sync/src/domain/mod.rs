//! Domain layer: snapshots, the snapshot cell, phase table and diff.

pub mod cell;
pub mod phase;
pub mod reconcile;
pub mod snapshot;

pub use cell::{SnapshotCell, SnapshotRef};
pub use phase::{phase_name, EdgeEffect, PhaseTable, PhaseViolation};
pub use reconcile::{reconcile, ReconcileSpec, Reconciliation, SideEffect};
pub use snapshot::{FieldPath, PartialRead, StateSnapshot};
