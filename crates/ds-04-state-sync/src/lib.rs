//! # DS-04 State Sync
//!
//! Multi-part state reads merged into atomic, versioned snapshots, and the
//! diff that turns consecutive snapshots into UI side effects.
//!
//! ## Architecture
//!
//! ```text
//!  PartialRead x N ──join_all──→ StateSnapshotAggregator ──publish──→ SnapshotCell (watch)
//!                                                                         │
//!                                     SideEffect* ←── Reconciler ←────────┘
//!                                                    (PhaseTable + ReconcileSpec)
//! ```
//!
//! ## Invariants
//!
//! - A snapshot is published only if every part of its cycle succeeded
//! - A failed or superseded cycle leaves the current snapshot untouched
//! - Published versions strictly increase
//! - Phase moves outside the table are reported as violations and produce
//!   no side effect
//!
//! ## Usage
//!
//! ```ignore
//! let aggregator = StateSnapshotAggregator::new(transport, codec, cell.clone(), reads);
//! let reconciler = Reconciler::new(PhaseTable::default(), spec);
//!
//! let snapshot = aggregator.refresh().await?;
//! for effect in reconciler.observe(snapshot).effects {
//!     ui.apply(effect);
//! }
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod error;
pub mod service;

pub use domain::{
    phase_name, reconcile, EdgeEffect, FieldPath, PartialRead, PhaseTable, PhaseViolation,
    ReconcileSpec, Reconciliation, SideEffect, SnapshotCell, SnapshotRef, StateSnapshot,
};
pub use error::AggregateError;
pub use service::{AggregatorStats, ReconcileStats, Reconciler, StateSnapshotAggregator};
