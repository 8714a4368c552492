//! # dApp Sync Test Suite
//!
//! Cross-crate scenarios run against the in-memory ledger.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs      # lobby-game metadata, ledger seeding
//!     ├── correlation.rs   # dispatch → tap → correlator
//!     ├── snapshots.rs     # aggregation and reconciliation
//!     └── session_flow.rs  # a running session end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ds-tests
//! cargo test -p ds-tests integration::correlation::
//! ```

pub mod integration;
