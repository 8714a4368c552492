//! # Shared Bus - In-Memory Broadcast Log
//!
//! The shared, ordered stream of messages actors exchange, plus the pieces
//! every subscriber needs around it.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────┐   append()   ┌──────────────┐   sink   ┌──────────────┐
//! │ InMemory     │ ───────────→ │ BroadcastLog │ ───────→ │  Listener    │
//! │ Ledger       │              │  (history)   │          │ (Subscription│
//! └──────────────┘              └──────────────┘          │  drop-guard) │
//!                                                         └──────────────┘
//! ```
//!
//! - **Bounded history:** resubscribe with a cursor replays what is retained.
//! - **Drop cleanup:** a [`Subscription`] removes its listener when dropped.
//! - **Replay guard:** [`SeenEventCache`] rejects already-delivered event ids.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod ledger;
pub mod publisher;
pub mod seen_cache;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, LogMessage};
pub use ledger::{InMemoryLedger, Responder};
pub use publisher::{BroadcastLog, EventPublisher};
pub use seen_cache::{SeenError, SeenEventCache};
pub use subscriber::Subscription;

/// Events retained by a log for cursor replay.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;
