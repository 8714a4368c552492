//! # Integration Scenarios
//!
//! - **correlation**: acknowledgement and reply matching, business failures,
//!   retry exhaustion, reordered and duplicated delivery
//! - **snapshots**: atomic multi-part cycles and phase side effects
//! - **session_flow**: the scheduler wiring all of it together

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod correlation;
#[cfg(test)]
mod session_flow;
#[cfg(test)]
mod snapshots;
