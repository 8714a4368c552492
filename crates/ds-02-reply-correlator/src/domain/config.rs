//! Correlator configuration.

use shared_types::entities::ActorId;

/// Default retry cycles before a call times out.
pub const DEFAULT_MAX_RETRIES: u32 = 40;

/// Default number of tapped events retained for matching.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Correlator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorConfig {
    /// Program whose untagged messages may be business replies.
    pub program: ActorId,
    /// Retry cycles before timing out a call.
    pub max_retries: u32,
    /// Tapped events retained for matching.
    pub history_capacity: usize,
}

impl CorrelatorConfig {
    #[must_use]
    pub fn new(program: ActorId) -> Self {
        Self {
            program,
            max_retries: DEFAULT_MAX_RETRIES,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
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
}
