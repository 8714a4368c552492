//! Metadata held in memory, e.g. embedded with `include_bytes!`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::MetadataError;
use crate::ports::MetadataSource;

/// In-memory metadata blob.
#[derive(Debug)]
pub struct StaticMetadataSource {
    name: String,
    blob: Vec<u8>,
    fetches: AtomicU64,
}

impl StaticMetadataSource {
    pub fn new(name: impl Into<String>, blob: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            blob: blob.into(),
            fetches: AtomicU64::new(0),
        }
    }

    /// Number of times the blob was fetched.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<u8>, MetadataError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.blob.clone())
    }
}
