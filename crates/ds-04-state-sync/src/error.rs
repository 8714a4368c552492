//! Error types for state synchronisation

use ds_01_metadata_codec::CodecError;
use shared_types::errors::TransportError;
use thiserror::Error;

/// Why an aggregation cycle published nothing.
///
/// In every case the previously published snapshot stays current.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// One partial read failed.
    #[error("Partial read `{part}` failed: {source}")]
    Read {
        part: String,
        #[source]
        source: TransportError,
    },

    /// A partial query could not be encoded.
    #[error("Query for `{part}` could not be encoded: {source}")]
    Query {
        part: String,
        #[source]
        source: CodecError,
    },

    /// A partial read returned bytes that do not decode.
    #[error("Partial read `{part}` did not decode: {source}")]
    Decode {
        part: String,
        #[source]
        source: CodecError,
    },

    /// A newer snapshot was published while this cycle was in flight.
    #[error("Cycle based on version {base} superseded by version {current}")]
    Superseded { base: u64, current: u64 },

    /// The cycle had no reads.
    #[error("No partial reads configured")]
    NoReads,
}

impl AggregateError {
    /// Label used for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Query { .. } => "query",
            Self::Decode { .. } => "decode",
            Self::Superseded { .. } => "superseded",
            Self::NoReads => "no_reads",
        }
    }
}
