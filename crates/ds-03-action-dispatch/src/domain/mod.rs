//! Domain layer: dispatch options, gas policy and configuration.

pub mod config;
pub mod options;

pub use config::DispatcherConfig;
pub use options::{
    with_margin, DispatchOptions, GasPolicy, DEFAULT_GAS_MARGIN_PERCENT, DEFAULT_MAX_GAS,
};
