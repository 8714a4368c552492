//! Error types for the reply correlator

use ds_01_metadata_codec::CodecError;
use shared_types::entities::CorrelationId;
use shared_types::errors::TransportError;
use thiserror::Error;

/// Why a pending call did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The program replied with a non-zero status code.
    #[error("Business failure (status {status_code}): {message}")]
    Business { status_code: i32, message: String },

    /// The business reply could not be decoded.
    #[error("Reply decode failed: {0}")]
    Decode(#[from] CodecError),

    /// No reply within the retry budget.
    #[error("No reply after {retries} retry cycles")]
    Timeout { retries: u32 },

    /// The owning session went away before the call settled.
    #[error("Call abandoned")]
    Abandoned,
}

impl CallError {
    /// Label used for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Business { .. } => "business",
            Self::Decode(_) => "decode",
            Self::Timeout { .. } => "timeout",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Errors from registering a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelatorError {
    /// A call with this id is already pending.
    #[error("Call {0} is already pending")]
    Duplicate(CorrelationId),
}

/// Errors from the event tap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapError {
    /// The transport refused the subscription.
    #[error("Subscription failed: {0}")]
    Subscribe(#[from] TransportError),

    /// Resubscribing failed too many times in a row.
    #[error("Gave up after {attempts} resubscribe attempts")]
    Exhausted { attempts: u32 },

    /// The tap was closed.
    #[error("Tap closed")]
    Closed,
}
