//! Correlator observer: counts settlements and asks for a prompt refresh.

use ds_02_reply_correlator::{CallError, CallObserver, CallOutcome, Resolution};
use ds_telemetry::{CALLS_REJECTED, CALLS_RESOLVED, CALLS_TIMED_OUT};
use shared_types::entities::CorrelationId;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

pub struct SettlementObserver {
    refresh: Arc<Notify>,
}

impl SettlementObserver {
    pub fn new(refresh: Arc<Notify>) -> Self {
        Self { refresh }
    }
}

impl CallObserver for SettlementObserver {
    fn on_settled(&self, correlation_id: CorrelationId, outcome: &CallOutcome) {
        match outcome {
            Ok(Resolution::Reply(_)) => CALLS_RESOLVED.with_label_values(&["reply"]).inc(),
            Ok(Resolution::Acknowledged) => {
                CALLS_RESOLVED.with_label_values(&["acknowledged"]).inc();
            }
            Err(CallError::Timeout { .. }) => CALLS_TIMED_OUT.inc(),
            Err(e) => CALLS_REJECTED.with_label_values(&[e.reason()]).inc(),
        }
        debug!(correlation_id = %correlation_id, ok = outcome.is_ok(), "Call settled, refresh requested");
        self.refresh.notify_one();
    }
}
