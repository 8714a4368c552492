//! Ports layer: trait definitions for external collaborators.

pub mod outbound;

pub use outbound::MetadataSource;
