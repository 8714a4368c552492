//! Ports layer: trait definitions.

pub mod outbound;

pub use outbound::CallObserver;
