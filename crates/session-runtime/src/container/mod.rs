//! # Session Container
//!
//! Configuration and the injectable engine store.

mod config;
mod store;

pub use config::{
    ConfigError, SessionConfig, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS,
    DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_INTERVAL,
};
pub use store::{EngineStore, DEFAULT_EFFECT_CAPACITY};
