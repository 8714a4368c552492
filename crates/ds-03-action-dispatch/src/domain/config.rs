//! Dispatcher configuration.

use super::options::DEFAULT_MAX_GAS;

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Upper bound for any action's gas limit.
    pub max_gas: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_gas: DEFAULT_MAX_GAS,
        }
    }
}
