//! Outbound Ports (Driven Ports)
//!
//! Where metadata blobs come from. The loader only needs the raw bytes.

use async_trait::async_trait;

use crate::error::MetadataError;

/// A fetchable metadata blob for one program (Driven Port).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Human-readable origin, used in errors and logs.
    fn describe(&self) -> String;

    /// Fetch the raw blob. Fails with [`MetadataError::Fetch`].
    async fn fetch(&self) -> Result<Vec<u8>, MetadataError>;
}
