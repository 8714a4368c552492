//! # Shared Types Crate
//!
//! This crate contains the identifiers, broadcast-log records and the
//! ledger transport port shared by every engine subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Opaque Ledger**: The engine only sees the ledger through
//!   [`LedgerTransport`]; signing and networking live elsewhere.
//! - **Untagged Business Replies**: Only automatic replies and failures carry
//!   [`ReplyDetails`]; business payloads are correlated by position.

pub mod entities;
pub mod errors;
pub mod ledger;

pub use entities::*;
pub use errors::*;
pub use ledger::*;
