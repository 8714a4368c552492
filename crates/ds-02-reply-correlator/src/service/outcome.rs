//! Awaitable outcome of one pending call.

use crate::domain::CallOutcome;
use crate::error::CallError;
use shared_types::entities::CorrelationId;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves to the call's outcome exactly once.
///
/// If the call is abandoned the correlator drops its sender and this
/// resolves to [`CallError::Abandoned`].
#[derive(Debug)]
pub struct OutcomeReceiver {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl OutcomeReceiver {
    pub(crate) fn new(correlation_id: CorrelationId, receiver: oneshot::Receiver<CallOutcome>) -> Self {
        Self {
            correlation_id,
            receiver,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Take the outcome if it is already available.
    pub fn try_outcome(&mut self) -> Option<CallOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CallError::Abandoned)),
        }
    }
}

impl Future for OutcomeReceiver {
    type Output = CallOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(CallError::Abandoned)))
    }
}
