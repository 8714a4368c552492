//! # Session Configuration
//!
//! Runtime parameters for one session. Every field has a default that
//! matches the reference client behaviour; `from_env` overrides them with
//! `DS_`-prefixed variables.

use ds_03_action_dispatch::{DEFAULT_GAS_MARGIN_PERCENT, DEFAULT_MAX_GAS};
use shared_types::entities::ActorId;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_RETRIES: u32 = 40;
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;
pub const DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS: u32 = 5;

/// Margins above this are almost certainly a unit mistake.
const MAX_GAS_MARGIN_PERCENT: u32 = 1000;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No program id configured.
    #[error("program id is not set (DS_PROGRAM_ID)")]
    MissingProgram,

    /// Neither a metadata path nor a metadata source was given.
    #[error("metadata location is not set (DS_METADATA_PATH)")]
    MissingMetadata,

    /// An environment variable did not parse.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// A value parsed but is out of range.
    #[error("{field} is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Complete session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Program the session talks to.
    pub program: Option<ActorId>,
    /// Interval between periodic aggregation cycles.
    pub poll_interval: Duration,
    /// Interval between correlator retry cycles.
    pub retry_interval: Duration,
    /// Retry cycles before a call times out.
    pub max_retries: u32,
    /// Tapped events retained for matching.
    pub history_capacity: usize,
    /// Consecutive resubscribe attempts before the tap gives up.
    pub max_resubscribe_attempts: u32,
    /// Upper bound for an action's gas limit.
    pub max_gas: u64,
    /// Margin added to gas estimates.
    pub gas_margin_percent: u32,
    /// Metadata blob on disk.
    pub metadata_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_resubscribe_attempts: DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS,
            max_gas: DEFAULT_MAX_GAS,
            gas_margin_percent: DEFAULT_GAS_MARGIN_PERCENT,
            metadata_path: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DS_PROGRAM_ID`: Program actor id, hex
    /// - `DS_POLL_INTERVAL_MS`: Aggregation interval (default: 3000)
    /// - `DS_RETRY_INTERVAL_MS`: Retry cycle interval (default: 1500)
    /// - `DS_MAX_RETRIES`: Retry cycles per call (default: 40)
    /// - `DS_HISTORY_CAPACITY`: Retained events (default: 256)
    /// - `DS_MAX_RESUBSCRIBE`: Resubscribe attempts (default: 5)
    /// - `DS_MAX_GAS`: Gas limit cap (default: 250000000000)
    /// - `DS_GAS_MARGIN_PERCENT`: Estimate margin (default: 20)
    /// - `DS_METADATA_PATH`: Metadata blob path
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("DS_PROGRAM_ID") {
            let program = ActorId::parse(&raw).map_err(|e| ConfigError::Invalid {
                key: "DS_PROGRAM_ID",
                reason: e.to_string(),
            })?;
            config.program = Some(program);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DS_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DS_RETRY_INTERVAL_MS")? {
            config.retry_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "DS_MAX_RETRIES")? {
            config.max_retries = n;
        }
        if let Some(n) = parse_var(&lookup, "DS_HISTORY_CAPACITY")? {
            config.history_capacity = n;
        }
        if let Some(n) = parse_var(&lookup, "DS_MAX_RESUBSCRIBE")? {
            config.max_resubscribe_attempts = n;
        }
        if let Some(n) = parse_var(&lookup, "DS_MAX_GAS")? {
            config.max_gas = n;
        }
        if let Some(n) = parse_var(&lookup, "DS_GAS_MARGIN_PERCENT")? {
            config.gas_margin_percent = n;
        }
        if let Some(path) = lookup("DS_METADATA_PATH") {
            config.metadata_path = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_program(mut self, program: ActorId) -> Self {
        self.program = Some(program);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_max_resubscribe_attempts(mut self, attempts: u32) -> Self {
        self.max_resubscribe_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_max_gas(mut self, max_gas: u64) -> Self {
        self.max_gas = max_gas;
        self
    }

    #[must_use]
    pub fn with_gas_margin_percent(mut self, percent: u32) -> Self {
        self.gas_margin_percent = percent;
        self
    }

    #[must_use]
    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = Some(path.into());
        self
    }

    /// Check the configuration before starting a session.
    ///
    /// A missing metadata path is not checked here; a session may be given a
    /// metadata source directly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program.is_none() {
            return Err(ConfigError::MissingProgram);
        }
        if self.poll_interval.is_zero() {
            return Err(out_of_range("poll_interval", "must be non-zero"));
        }
        if self.retry_interval.is_zero() {
            return Err(out_of_range("retry_interval", "must be non-zero"));
        }
        if self.max_retries == 0 {
            return Err(out_of_range("max_retries", "must be at least 1"));
        }
        if self.history_capacity == 0 {
            return Err(out_of_range("history_capacity", "must be at least 1"));
        }
        if self.max_gas == 0 {
            return Err(out_of_range("max_gas", "must be non-zero"));
        }
        if self.gas_margin_percent > MAX_GAS_MARGIN_PERCENT {
            return Err(out_of_range(
                "gas_margin_percent",
                &format!("must be at most {MAX_GAS_MARGIN_PERCENT}"),
            ));
        }
        Ok(())
    }

    /// Program id of a validated configuration.
    pub fn program_id(&self) -> Result<ActorId, ConfigError> {
        self.program.ok_or(ConfigError::MissingProgram)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn out_of_range(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        reason: reason.to_string(),
    }
}
