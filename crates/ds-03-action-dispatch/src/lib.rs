//! # DS-03 Action Dispatch
//!
//! Builds a signed action from a typed value, submits it to the ledger and
//! registers exactly one pending call for it.
//!
//! ## Preconditions
//!
//! Dispatch needs an identity ([`Signer`]) and program metadata
//! ([`Codec`](ds_01_metadata_codec::Codec)). Either can be cleared at any
//! time (account switch, metadata reload); until both are back, dispatch
//! fails with [`DispatchError::NotReady`] without touching the network.
//!
//! ## Gas
//!
//! | Policy | Limit |
//! |--------|-------|
//! | `Max` | configured maximum |
//! | `Fixed(n)` | `n`, refused above the maximum |
//! | `Estimated { margin_percent }` | ledger minimum plus margin, capped |
//!
//! ## Usage
//!
//! ```ignore
//! let dispatcher = ActionDispatcher::new(config, session, transport, correlator);
//! dispatcher.set_signer(Some(signer));
//! dispatcher.set_codec(codec)?;
//!
//! let call = dispatcher.dispatch(program, &Value::variant("Register"), DispatchOptions::default()).await?;
//! let resolution = call.outcome.await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::StaticSigner;
pub use domain::{
    DispatchOptions, DispatcherConfig, GasPolicy, DEFAULT_GAS_MARGIN_PERCENT, DEFAULT_MAX_GAS,
};
pub use error::DispatchError;
pub use ports::Signer;
pub use service::{ActionDispatcher, DispatchStats, DispatchedCall};
