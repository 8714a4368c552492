//! # DS Telemetry
//!
//! Structured logging and Prometheus counters for the sync engine.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON
//! - **Metrics**: process-wide Prometheus counters in an engine registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ds_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ds_telemetry::CALLS_DISPATCHED.inc();
//! println!("{}", ds_telemetry::gather()?);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DS_LOG_LEVEL` | `info` | Filter directive, falls back to `RUST_LOG` |
//! | `DS_JSON_LOGS` | `false` | One JSON object per line |
//! | `DS_SERVICE_NAME` | `dapp-sync` | Service name in lifecycle logs |

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
mod metrics;

pub use config::{TelemetryConfig, DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_NAME};
pub use logging::init_logging;
pub use metrics::{
    gather, register_metrics, HistogramTimer, CALLS_DISPATCHED, CALLS_PENDING, CALLS_REJECTED,
    CALLS_RESOLVED, CALLS_TIMED_OUT, DISPATCH_FAILURES, EVENTS_TAPPED, PHASE_VIOLATIONS,
    REGISTRY, SIDE_EFFECTS, SNAPSHOT_CYCLES, SNAPSHOT_CYCLE_DURATION, SNAPSHOT_VERSION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Register metrics and install the global subscriber.
///
/// Metrics are registered even if logging was already initialized by the
/// host; in that case the logging error is returned after registration.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard held for the lifetime of the process.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_registers_metrics_even_when_logging_taken() {
        let config = TelemetryConfig::default().with_log_level("warn");
        let first = init_telemetry(&config);
        let second = init_telemetry(&config);
        assert!(matches!(second, Err(TelemetryError::AlreadyInitialized(_))));
        drop(first);
        assert!(gather().unwrap().contains("ds_tap_events_total"));
    }
}
