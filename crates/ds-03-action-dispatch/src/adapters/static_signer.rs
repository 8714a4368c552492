//! Signer with fixed signature bytes.
//!
//! Pairs with the in-memory ledger, which does not verify signatures.

use crate::ports::Signer;
use async_trait::async_trait;
use shared_types::entities::ActorId;
use shared_types::errors::SignerError;
use shared_types::ledger::{SignedAction, UnsignedAction};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct StaticSigner {
    account: ActorId,
    signature: Vec<u8>,
    decline_next: AtomicBool,
    signed: AtomicU64,
}

impl StaticSigner {
    #[must_use]
    pub fn new(account: ActorId) -> Self {
        Self {
            account,
            signature: account.as_bytes().to_vec(),
            decline_next: AtomicBool::new(false),
            signed: AtomicU64::new(0),
        }
    }

    /// Refuse the next signing request as a user would.
    pub fn decline_next(&self) {
        self.decline_next.store(true, Ordering::SeqCst);
    }

    /// Number of actions signed.
    #[must_use]
    pub fn signed_count(&self) -> u64 {
        self.signed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Signer for StaticSigner {
    fn account(&self) -> ActorId {
        self.account
    }

    async fn sign(&self, action: UnsignedAction) -> Result<SignedAction, SignerError> {
        if self.decline_next.swap(false, Ordering::SeqCst) {
            return Err(SignerError::Declined);
        }
        self.signed.fetch_add(1, Ordering::Relaxed);
        Ok(SignedAction {
            action,
            signature: self.signature.clone(),
        })
    }
}
