//! Service layer: metadata loading and codec construction.

pub mod loader;

pub use loader::{load, MetadataLoader};
