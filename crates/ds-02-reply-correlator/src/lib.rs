//! # DS-02 Reply Correlator
//!
//! Matches dispatched actions to their asynchronous replies on the shared
//! broadcast log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  TapItem   ┌──────────────────────────────────────────┐
//! │   EventTap   │ ─────────→ │             ReplyCorrelator              │
//! │ (seen cache, │            │  ┌────────────┐     ┌─────────────────┐  │
//! │  resubscribe)│            │  │EventHistory│ ──→ │ PendingCall map │  │
//! └──────▲───────┘            │  └────────────┘     └────────┬────────┘  │
//!        │                    └──────────────────────────────┼───────────┘
//!  LedgerTransport                         oneshot          │ watch
//!                                    OutcomeReceiver   PendingSet
//! ```
//!
//! ## Invariants
//!
//! - Every call settles at most once, however events are reordered or
//!   duplicated
//! - Business replies carry no reply metadata; they are assigned to pending
//!   calls in dispatch order by decoding them
//! - An abandoned call never settles; its receiver yields
//!   [`CallError::Abandoned`]
//! - The pending set is replaced wholesale on every change
//!
//! ## Usage
//!
//! ```ignore
//! use ds_02_reply_correlator::{CallOptions, CorrelatorConfig, ReplyCorrelator};
//!
//! let correlator = ReplyCorrelator::new(CorrelatorConfig::new(program));
//! let outcome = correlator.register(id, session, decoder, CallOptions::default())?;
//!
//! while let Ok(TapItem::Event(event)) = tap.next().await {
//!     correlator.ingest(event);
//! }
//! let reply = outcome.await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{EventTap, TapConfig, TapItem, TapStats};
pub use domain::{
    CallOptions, CallOutcome, CallState, CorrelatorConfig, EventHistory, PendingSet,
    PendingSummary, Resolution,
};
pub use error::{CallError, CorrelatorError, TapError};
pub use ports::CallObserver;
pub use service::{CorrelatorStats, OutcomeReceiver, ReplyCorrelator};
