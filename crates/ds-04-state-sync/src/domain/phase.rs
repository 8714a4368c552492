//! # Phase Transition Table
//!
//! Default lifecycle:
//!
//! ```text
//!                RestartCountdown
//! Registration ─────────────────→ Active ←──────────────┐
//!     ▲                              │                  │ RestartCountdown
//!     │ NavigateToLobby              ▼                  │
//!    Over ←─────────────────────Resolving ──────────────┘
//! ```
//!
//! Any move not listed is a violation: it is reported, never applied.

use ds_01_metadata_codec::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const REGISTRATION: &str = "Registration";
pub const ACTIVE: &str = "Active";
pub const RESOLVING: &str = "Resolving";
pub const OVER: &str = "Over";

/// Side effect attached to a table edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeEffect {
    None,
    RestartCountdown,
    NavigateToLobby,
    ClearOverlay,
}

/// A phase move the table does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseViolation {
    #[error("Unknown phase `{0}`")]
    UnknownPhase(String),

    #[error("No transition from `{from}` to `{to}`")]
    NoEdge { from: String, to: String },
}

/// Named phases and the allowed moves between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable {
    phases: BTreeSet<String>,
    edges: BTreeMap<(String, String), EdgeEffect>,
}

impl PhaseTable {
    /// A table with no phases.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            phases: BTreeSet::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Add an edge; both phases become known.
    #[must_use]
    pub fn edge(mut self, from: &str, to: &str, effect: EdgeEffect) -> Self {
        self.phases.insert(from.to_string());
        self.phases.insert(to.to_string());
        self.edges.insert((from.to_string(), to.to_string()), effect);
        self
    }

    #[must_use]
    pub fn is_known(&self, phase: &str) -> bool {
        self.phases.contains(phase)
    }

    pub fn phases(&self) -> impl Iterator<Item = &str> {
        self.phases.iter().map(String::as_str)
    }

    /// Effect of moving `from -> to`.
    pub fn check(&self, from: &str, to: &str) -> Result<EdgeEffect, PhaseViolation> {
        for phase in [from, to] {
            if !self.is_known(phase) {
                return Err(PhaseViolation::UnknownPhase(phase.to_string()));
            }
        }
        self.edges
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| PhaseViolation::NoEdge {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::empty()
            .edge(REGISTRATION, ACTIVE, EdgeEffect::RestartCountdown)
            .edge(ACTIVE, RESOLVING, EdgeEffect::None)
            .edge(RESOLVING, ACTIVE, EdgeEffect::RestartCountdown)
            .edge(RESOLVING, OVER, EdgeEffect::None)
            .edge(OVER, REGISTRATION, EdgeEffect::NavigateToLobby)
    }
}

/// Phase name carried by a decoded value: a variant name or a string.
#[must_use]
pub fn phase_name(value: &Value) -> Option<&str> {
    value.variant_name().or_else(|| value.as_str())
}
