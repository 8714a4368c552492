//! # Action Dispatcher
//!
//! Turns an action value into exactly one signed submission and one pending
//! call.
//!
//! ## Flow
//!
//! 1. Readiness: signer and codec must both be installed, else `NotReady`
//!    before any network call
//! 2. Encode the action with the program's input type
//! 3. Choose the gas limit (estimate only after the readiness check)
//! 4. Sign
//! 5. Read the correlator watermark, then submit
//! 6. Register the pending call under the returned correlation id
//!
//! A local rejection at step 5 leaves no pending call behind.
//!
//! ## Identity changes
//!
//! Every `set_signer` bumps the identity generation. A dispatch that sees a
//! newer generation after signing submits nothing and fails with
//! `IdentityChanged`. One that sees it after submitting registers nothing;
//! its outcome is already `Abandoned`.

use crate::domain::{with_margin, DispatchOptions, DispatcherConfig, GasPolicy};
use crate::error::DispatchError;
use crate::ports::Signer;
use ds_01_metadata_codec::{Codec, CodecError, PayloadDecoder, Value, VariantDecoder};
use ds_02_reply_correlator::{CallOptions, OutcomeReceiver, ReplyCorrelator};
use parking_lot::RwLock;
use shared_types::entities::{ActorId, CorrelationId, SessionId};
use shared_types::ledger::{LedgerTransport, UnsignedAction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dispatcher statistics
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Actions submitted and registered
    pub dispatched: AtomicU64,
    /// Dispatches refused before any network call
    pub not_ready: AtomicU64,
    /// Dispatches that failed after the readiness check
    pub failed: AtomicU64,
}

/// A submitted action and its outcome.
#[derive(Debug)]
pub struct DispatchedCall {
    pub correlation_id: CorrelationId,
    pub outcome: OutcomeReceiver,
}

#[derive(Default)]
struct Identity {
    signer: Option<Arc<dyn Signer>>,
    generation: u64,
}

#[derive(Clone)]
struct Metadata {
    codec: Codec,
    decoder: Arc<dyn PayloadDecoder>,
}

/// Action dispatcher bound to one session.
pub struct ActionDispatcher {
    config: DispatcherConfig,
    session: SessionId,
    transport: Arc<dyn LedgerTransport>,
    correlator: Arc<ReplyCorrelator>,
    identity: RwLock<Identity>,
    metadata: RwLock<Option<Metadata>>,
    stats: DispatchStats,
}

impl ActionDispatcher {
    pub fn new(
        config: DispatcherConfig,
        session: SessionId,
        transport: Arc<dyn LedgerTransport>,
        correlator: Arc<ReplyCorrelator>,
    ) -> Self {
        Self {
            config,
            session,
            transport,
            correlator,
            identity: RwLock::new(Identity::default()),
            metadata: RwLock::new(None),
            stats: DispatchStats::default(),
        }
    }

    /// Install or clear the signing identity.
    pub fn set_signer(&self, signer: Option<Arc<dyn Signer>>) {
        let account = signer.as_ref().map(|s| s.account());
        let generation = {
            let mut identity = self.identity.write();
            identity.signer = signer;
            identity.generation += 1;
            identity.generation
        };
        info!(session = %self.session, account = ?account, generation, "Dispatcher identity changed");
    }

    /// Install the codec and derive the reply decoder from it.
    ///
    /// # Errors
    ///
    /// Fails if the metadata declares no variant reply type.
    pub fn set_codec(&self, codec: Codec) -> Result<(), CodecError> {
        let decoder = VariantDecoder::for_replies(codec.clone())?;
        self.install(codec, Arc::new(decoder));
        Ok(())
    }

    /// Install a codec with a custom reply decoder.
    pub fn install(&self, codec: Codec, decoder: Arc<dyn PayloadDecoder>) {
        *self.metadata.write() = Some(Metadata { codec, decoder });
        debug!(session = %self.session, "Dispatcher metadata installed");
    }

    /// Drop the installed metadata.
    pub fn clear_codec(&self) {
        *self.metadata.write() = None;
    }

    /// Whether both identity and metadata are installed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.identity.read().signer.is_some() && self.metadata.read().is_some()
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Submit `action` to `destination` and register its pending call.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NotReady` - no signer or no codec; nothing was sent
    /// - `DispatchError::Encode` - the value does not fit the input type
    /// - `DispatchError::Gas` / `GasLimitExceeded` - no usable gas limit
    /// - `DispatchError::Signing` - the signer refused
    /// - `DispatchError::IdentityChanged` - the account switched while signing
    /// - `DispatchError::SubmissionRejected` - the ledger refused locally
    pub async fn dispatch(
        &self,
        destination: ActorId,
        action: &Value,
        options: DispatchOptions,
    ) -> Result<DispatchedCall, DispatchError> {
        let (signer, generation, metadata) = self.ready().inspect_err(|_| {
            self.stats.not_ready.fetch_add(1, Ordering::Relaxed);
        })?;

        let result = self
            .submit(signer, generation, metadata, destination, action, options)
            .await;
        match &result {
            Ok(call) => {
                self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                info!(
                    session = %self.session,
                    correlation_id = %call.correlation_id,
                    destination = %destination,
                    "Action dispatched"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(session = %self.session, reason = e.reason(), error = %e, "Dispatch failed");
            }
        }
        result
    }

    fn ready(&self) -> Result<(Arc<dyn Signer>, u64, Metadata), DispatchError> {
        let (signer, generation) = {
            let identity = self.identity.read();
            (identity.signer.clone(), identity.generation)
        };
        let metadata = self.metadata.read().clone();
        match (signer, metadata) {
            (Some(signer), Some(metadata)) => Ok((signer, generation, metadata)),
            (None, None) => Err(DispatchError::NotReady {
                missing: "identity and metadata",
            }),
            (None, Some(_)) => Err(DispatchError::NotReady { missing: "identity" }),
            (Some(_), None) => Err(DispatchError::NotReady { missing: "metadata" }),
        }
    }

    async fn submit(
        &self,
        signer: Arc<dyn Signer>,
        generation: u64,
        metadata: Metadata,
        destination: ActorId,
        action: &Value,
        options: DispatchOptions,
    ) -> Result<DispatchedCall, DispatchError> {
        let payload = metadata.codec.encode_action(action)?;
        let mut unsigned = UnsignedAction {
            source: signer.account(),
            destination,
            payload,
            gas_limit: self.config.max_gas,
            value: options.value,
        };
        unsigned.gas_limit = self.gas_limit(&unsigned, options.gas).await?;
        debug!(gas_limit = unsigned.gas_limit, bytes = unsigned.payload.len(), "Action built");

        let signed = signer.sign(unsigned).await?;
        if self.identity.read().generation != generation {
            return Err(DispatchError::IdentityChanged);
        }

        let not_before = self.correlator.watermark();
        let correlation_id = self.transport.submit(signed).await?;

        // Held across register so a concurrent switch either sees this call
        // in its abandon sweep or bumps the generation first.
        let identity = self.identity.read();
        if identity.generation != generation {
            warn!(
                session = %self.session,
                correlation_id = %correlation_id,
                "Identity changed during submission, abandoning call"
            );
            return Ok(DispatchedCall {
                correlation_id,
                outcome: self.correlator.abandoned(correlation_id),
            });
        }
        let outcome = self.correlator.register(
            correlation_id,
            self.session,
            metadata.decoder,
            CallOptions {
                expect_reply: options.expect_reply,
                retries: options.retries,
                not_before,
            },
        )?;
        drop(identity);

        Ok(DispatchedCall {
            correlation_id,
            outcome,
        })
    }

    async fn gas_limit(&self, action: &UnsignedAction, policy: GasPolicy) -> Result<u64, DispatchError> {
        let max = self.config.max_gas;
        match policy {
            GasPolicy::Max => Ok(max),
            GasPolicy::Fixed(limit) if limit > max => Err(DispatchError::GasLimitExceeded {
                required: limit,
                max,
            }),
            GasPolicy::Fixed(limit) => Ok(limit),
            GasPolicy::Estimated { margin_percent } => {
                let estimate = self
                    .transport
                    .estimate_gas(action)
                    .await
                    .map_err(DispatchError::Gas)?;
                with_margin(estimate.min_limit, margin_percent, max).ok_or(
                    DispatchError::GasLimitExceeded {
                        required: estimate.min_limit,
                        max,
                    },
                )
            }
        }
    }
}
