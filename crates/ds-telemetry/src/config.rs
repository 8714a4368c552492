//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_SERVICE_NAME: &str = "dapp-sync";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration for one engine process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to lifecycle logs
    pub service_name: String,

    /// Filter directive (`info`, `ds_02_reply_correlator=debug`, ...)
    pub log_level: String,

    /// Emit one JSON object per line instead of pretty output
    pub json_logs: bool,

    /// Include the module target in each line
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DS_SERVICE_NAME`: Service name (default: dapp-sync)
    /// - `DS_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `DS_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `DS_LOG_TARGET`: Include targets (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            service_name: lookup("DS_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("DS_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: lookup("DS_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.json_logs),
            with_target: lookup("DS_LOG_TARGET")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.with_target),
        }
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
