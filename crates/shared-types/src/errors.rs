//! # Error Types
//!
//! Defines error types shared by every component talking to the ledger.

use thiserror::Error;

/// Errors surfaced by a ledger transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport is not connected.
    #[error("Transport disconnected")]
    Disconnected,

    /// The request did not complete in time.
    #[error("Transport timeout after {millis}ms")]
    Timeout { millis: u64 },

    /// The node answered with an error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A state read for the given actor failed.
    #[error("Read failed for {actor}: {reason}")]
    ReadFailed { actor: String, reason: String },
}

/// Why the ledger client refused a signed action before broadcasting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The signature did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// Not enough balance or gas budget to cover the action.
    #[error("insufficient resource budget: {0}")]
    InsufficientBudget(String),

    /// The nonce or mortality window was stale.
    #[error("stale transaction")]
    Stale,

    /// Any other local rejection.
    #[error("{0}")]
    Other(String),
}

/// Local rejection of a submission. No pending call exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Submission rejected: {reason}")]
pub struct SubmissionRejected {
    /// Reason reported by the ledger client.
    pub reason: RejectReason,
}

impl From<RejectReason> for SubmissionRejected {
    fn from(reason: RejectReason) -> Self {
        Self { reason }
    }
}

/// Errors from a signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user declined to sign.
    #[error("Signing declined by user")]
    Declined,

    /// The signer backend failed.
    #[error("Signer failure: {0}")]
    Backend(String),
}
