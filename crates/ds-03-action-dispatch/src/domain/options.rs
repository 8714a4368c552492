//! Per-dispatch options and gas policy.

use serde::{Deserialize, Serialize};

/// Default upper bound for an action's gas limit.
pub const DEFAULT_MAX_GAS: u64 = 250_000_000_000;

/// Default margin added on top of an estimate.
pub const DEFAULT_GAS_MARGIN_PERCENT: u32 = 20;

/// How the gas limit of an action is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasPolicy {
    /// Use the configured maximum.
    Max,
    /// Use exactly this limit.
    Fixed(u64),
    /// Ask the ledger for the minimum limit and add a margin.
    Estimated { margin_percent: u32 },
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::Estimated {
            margin_percent: DEFAULT_GAS_MARGIN_PERCENT,
        }
    }
}

/// Options for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOptions {
    pub gas: GasPolicy,
    /// Value transferred with the action.
    pub value: u128,
    /// Wait for a business reply, or settle on acknowledgement.
    pub expect_reply: bool,
    /// Retry cycles before the call times out. `None` uses the correlator default.
    pub retries: Option<u32>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            gas: GasPolicy::default(),
            value: 0,
            expect_reply: true,
            retries: None,
        }
    }
}

impl DispatchOptions {
    #[must_use]
    pub fn with_gas(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// Settle the call on acknowledgement alone.
    #[must_use]
    pub fn ack_only(mut self) -> Self {
        self.expect_reply = false;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Add `margin_percent` to `min_limit`, capped at `max`.
///
/// Returns `None` when even `min_limit` exceeds `max`.
#[must_use]
pub fn with_margin(min_limit: u64, margin_percent: u32, max: u64) -> Option<u64> {
    if min_limit > max {
        return None;
    }
    let padded = u128::from(min_limit) * (100 + u128::from(margin_percent)) / 100;
    Some(u64::try_from(padded).unwrap_or(u64::MAX).min(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_added() {
        assert_eq!(with_margin(1_000, 20, u64::MAX), Some(1_200));
        assert_eq!(with_margin(1_000, 0, u64::MAX), Some(1_000));
    }

    #[test]
    fn test_margin_capped_at_max() {
        assert_eq!(with_margin(900, 20, 1_000), Some(1_000));
        assert_eq!(with_margin(u64::MAX, 50, u64::MAX), Some(u64::MAX));
    }

    #[test]
    fn test_minimum_above_max() {
        assert_eq!(with_margin(2_000, 20, 1_000), None);
    }

    #[test]
    fn test_default_options() {
        let options = DispatchOptions::default();
        assert!(options.expect_reply);
        assert_eq!(
            options.gas,
            GasPolicy::Estimated {
                margin_percent: DEFAULT_GAS_MARGIN_PERCENT
            }
        );
        assert!(!options.ack_only().expect_reply);
    }
}
