//! Error types for session startup and shutdown

use crate::container::ConfigError;
use ds_01_metadata_codec::{CodecError, MetadataError};
use ds_02_reply_correlator::TapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Metadata unavailable: {0}")]
    Metadata(#[from] MetadataError),

    /// The metadata declares no usable reply type.
    #[error("Metadata unusable: {0}")]
    Codec(#[from] CodecError),

    #[error("Event tap failed to open: {0}")]
    Tap(#[from] TapError),

    #[error("Scheduler task failed: {0}")]
    Join(String),
}
