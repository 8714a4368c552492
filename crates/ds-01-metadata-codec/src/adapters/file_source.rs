//! Metadata read from a file on disk.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::MetadataError;
use crate::ports::MetadataSource;

/// Reads a metadata blob (raw or hex text) from a path.
#[derive(Debug, Clone)]
pub struct FileMetadataSource {
    path: PathBuf,
}

impl FileMetadataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, MetadataError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| MetadataError::Fetch {
                source_name: self.describe(),
                reason: e.to_string(),
            })
    }
}
