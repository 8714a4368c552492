//! Startup helpers for host binaries.

use crate::container::SessionConfig;
use crate::session::{Session, SessionHandle};
use anyhow::{Context, Result};
use ds_telemetry::{TelemetryConfig, TelemetryError, TelemetryGuard};
use shared_types::ledger::LedgerTransport;
use std::sync::Arc;
use tracing::warn;

/// A session started from the environment, with its telemetry guard.
pub struct Launched {
    pub session: SessionHandle,
    /// `None` when the host had already installed a subscriber.
    pub telemetry: Option<TelemetryGuard>,
}

/// Initialise telemetry and start a session configured from `DS_*`
/// variables. `setup` adds what the environment cannot carry: signer,
/// partial reads, reconcile paths.
pub async fn launch_from_env<F>(transport: Arc<dyn LedgerTransport>, setup: F) -> Result<Launched>
where
    F: FnOnce(Session) -> Session,
{
    let telemetry = match ds_telemetry::init_telemetry(&TelemetryConfig::from_env()) {
        Ok(guard) => Some(guard),
        Err(TelemetryError::AlreadyInitialized(reason)) => {
            warn!(%reason, "Keeping the host's tracing subscriber");
            None
        }
        Err(e) => return Err(e).context("initializing telemetry"),
    };

    let config = SessionConfig::from_env().context("reading DS_* configuration")?;
    config.validate().context("validating session configuration")?;

    let session = setup(Session::new(config, transport))
        .start()
        .await
        .context("starting session")?;

    Ok(Launched { session, telemetry })
}
