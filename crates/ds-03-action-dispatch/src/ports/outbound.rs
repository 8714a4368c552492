//! Outbound Ports (Driven Ports)

use async_trait::async_trait;
use shared_types::entities::ActorId;
use shared_types::errors::SignerError;
use shared_types::ledger::{SignedAction, UnsignedAction};

/// Port: sign actions on behalf of the current account.
///
/// Wallet integration lives behind this trait; the engine never holds keys.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Account the signer signs for.
    fn account(&self) -> ActorId;

    /// Sign one action.
    async fn sign(&self, action: UnsignedAction) -> Result<SignedAction, SignerError>;
}
