//! # Session Runtime
//!
//! Assembles one client session of the sync engine and drives it from a
//! single scheduler task.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────────── scheduler task ───────────────────────┐
//!  LedgerTransport│  EventTap ──→ ReplyCorrelator ──observer──→ refresh notify   │
//!  ──────────────→│                    │ pending watch               │           │
//!                 │  retry tick ───────┘                             ↓           │
//!                 │  poll tick / state change / resync ──→ Aggregator → Reconciler│
//!                 └────────────────────────────┬──────────────────────┬──────────┘
//!                                              ↓                      ↓
//!                                     EngineStore: snapshot cell   side effects
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Load metadata and build the codec
//! 3. Build correlator, dispatcher, tap and aggregator
//! 4. Open the broadcast subscription
//! 5. Spawn the scheduler; the first poll tick publishes the initial snapshot
//!
//! ## Usage
//!
//! ```ignore
//! let handle = Session::new(config, transport)
//!     .with_signer(signer)
//!     .with_reads(reads)
//!     .with_reconcile(spec)
//!     .start()
//!     .await?;
//!
//! let call = handle.dispatch_action(&action, handle.default_options()).await?;
//! let reply = call.outcome.await?;
//! handle.shutdown().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod container;
pub mod error;
pub mod session;
pub mod startup;
pub mod wiring;

pub use container::{ConfigError, EngineStore, SessionConfig};
pub use error::SessionError;
pub use session::{Session, SessionHandle};
pub use startup::{launch_from_env, Launched};
pub use wiring::SettlementObserver;
