//! Metadata loader with a per-source cache.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::domain::{Codec, ProgramMetadata};
use crate::error::MetadataError;
use crate::ports::MetadataSource;

/// Fetch and parse metadata from `source` once.
pub async fn load(source: &dyn MetadataSource) -> Result<ProgramMetadata, MetadataError> {
    let blob = source.fetch().await?;
    debug!(source = %source.describe(), bytes = blob.len(), "Metadata fetched");
    ProgramMetadata::from_blob(&blob)
}

/// Loads metadata from one source and caches the result.
///
/// A failed load leaves the cache empty; calling `load` again retries.
pub struct MetadataLoader {
    source: Arc<dyn MetadataSource>,
    cached: OnceCell<Arc<ProgramMetadata>>,
}

impl MetadataLoader {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            cached: OnceCell::new(),
        }
    }

    /// Load the metadata, fetching only if not cached.
    pub async fn load(&self) -> Result<Arc<ProgramMetadata>, MetadataError> {
        let metadata = self
            .cached
            .get_or_try_init(|| async {
                match load(self.source.as_ref()).await {
                    Ok(metadata) => {
                        info!(
                            source = %self.source.describe(),
                            types = metadata.types.len(),
                            "Metadata loaded"
                        );
                        Ok(Arc::new(metadata))
                    }
                    Err(e) => {
                        warn!(source = %self.source.describe(), error = %e, "Metadata load failed");
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(metadata))
    }

    /// Load the metadata and build a codec over it.
    pub async fn codec(&self) -> Result<Codec, MetadataError> {
        Ok(Codec::new(self.load().await?))
    }

    /// Cached metadata, if already loaded.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<ProgramMetadata>> {
        self.cached.get().cloned()
    }
}
