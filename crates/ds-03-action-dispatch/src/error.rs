//! Error types for action dispatch

use ds_01_metadata_codec::CodecError;
use ds_02_reply_correlator::CorrelatorError;
use shared_types::errors::{SignerError, SubmissionRejected, TransportError};
use thiserror::Error;

/// Errors from dispatching an action.
///
/// Only `Register` can follow a submission that reached the ledger; every
/// other variant means nothing was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Identity or metadata is missing. No network call was made.
    #[error("Dispatcher not ready: missing {missing}")]
    NotReady { missing: &'static str },

    /// The account switched while the action was being signed. Nothing was
    /// submitted.
    #[error("Identity changed before submission")]
    IdentityChanged,

    /// The ledger client refused the signed action.
    #[error(transparent)]
    SubmissionRejected(#[from] SubmissionRejected),

    /// The action value does not fit the program's input type.
    #[error("Action encoding failed: {0}")]
    Encode(#[from] CodecError),

    /// Gas estimation failed.
    #[error("Gas estimation failed: {0}")]
    Gas(#[source] TransportError),

    /// The action needs more gas than allowed.
    #[error("Action needs {required} gas, limit is {max}")]
    GasLimitExceeded { required: u64, max: u64 },

    /// The signer refused or failed.
    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    /// The ledger issued an id that is already pending.
    #[error("Pending call registration failed: {0}")]
    Register(#[from] CorrelatorError),
}

impl DispatchError {
    /// Label used for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::IdentityChanged => "identity_changed",
            Self::SubmissionRejected(_) => "rejected",
            Self::Encode(_) => "encode",
            Self::Gas(_) | Self::GasLimitExceeded { .. } => "gas",
            Self::Signing(_) => "signing",
            Self::Register(_) => "register",
        }
    }
}
