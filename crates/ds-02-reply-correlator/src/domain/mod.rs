//! Domain layer: call state machine, event history and configuration.

pub mod call;
pub mod config;
pub mod history;

pub use call::{CallOptions, CallOutcome, CallState, PendingSet, PendingSummary, Resolution};
pub use config::CorrelatorConfig;
pub use history::{EventHistory, HistoryEntry};
