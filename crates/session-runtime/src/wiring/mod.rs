//! # Session Wiring
//!
//! The scheduler task and the hooks it installs on the correlator.

mod observer;
mod scheduler;

pub use observer::SettlementObserver;
pub(crate) use scheduler::{Scheduler, SchedulerControl};
