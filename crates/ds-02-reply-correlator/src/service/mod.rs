//! Service layer: correlator and outcome futures.

pub mod correlator;
pub mod outcome;

pub use correlator::{CorrelatorStats, ReplyCorrelator};
pub use outcome::OutcomeReceiver;
