//! Adapters layer: broadcast-log tap.

pub mod event_tap;

pub use event_tap::{EventTap, TapConfig, TapItem, TapStats, DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS};
