//! Outbound Ports (Driven Ports)

use crate::domain::CallOutcome;
use shared_types::entities::CorrelationId;

/// Notified after each call resolves or is rejected.
///
/// Invoked outside the correlator lock. Abandoned calls are not reported.
pub trait CallObserver: Send + Sync {
    fn on_settled(&self, correlation_id: CorrelationId, outcome: &CallOutcome);
}
