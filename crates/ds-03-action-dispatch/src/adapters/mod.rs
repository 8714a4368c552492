//! Adapters layer: signer implementations.

pub mod static_signer;

pub use static_signer::StaticSigner;
