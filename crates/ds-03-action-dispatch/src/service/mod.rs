//! Service layer: the dispatcher.

pub mod dispatcher;

pub use dispatcher::{ActionDispatcher, DispatchStats, DispatchedCall};
