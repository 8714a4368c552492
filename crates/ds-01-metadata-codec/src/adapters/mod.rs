//! Adapters layer: metadata sources.

pub mod file_source;
pub mod static_source;

pub use file_source::FileMetadataSource;
pub use static_source::StaticMetadataSource;
