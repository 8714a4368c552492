//! # Event Tap
//!
//! Lazy, restartable view of the broadcast log for one program and account.
//!
//! - Nothing is subscribed until the first `next()`
//! - Already-delivered event ids are suppressed by a bounded seen cache
//! - A transport-side close triggers a resubscribe from the high-water cursor
//! - If the transport cannot replay, a [`TapItem::Resync`] follows the
//!   resubscribe so the caller can re-read state
//! - `close()` or drop releases the transport listener

use crate::error::TapError;
use futures::stream::{self, Stream};
use shared_bus::SeenEventCache;
use shared_types::entities::{ActorId, BroadcastEvent};
use shared_types::ledger::{LedgerTransport, Unsubscribe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Default resubscribe attempts before giving up.
pub const DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS: u32 = 5;

/// One item produced by the tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapItem {
    /// A new event involving the tracked program and account.
    Event(BroadcastEvent),
    /// Events may have been missed during a resubscribe gap.
    Resync,
}

/// Event tap configuration.
#[derive(Debug, Clone)]
pub struct TapConfig {
    /// Program whose traffic is tapped.
    pub program: ActorId,
    /// Current account. `None` passes all traffic of the program.
    pub account: Option<ActorId>,
    /// Consecutive resubscribes without a delivery before giving up.
    pub max_resubscribe_attempts: u32,
    /// Event ids remembered for replay suppression.
    pub seen_capacity: usize,
    /// Base delay between resubscribe attempts; grows linearly.
    pub resubscribe_backoff: Duration,
}

impl TapConfig {
    #[must_use]
    pub fn new(program: ActorId) -> Self {
        Self {
            program,
            account: None,
            max_resubscribe_attempts: DEFAULT_MAX_RESUBSCRIBE_ATTEMPTS,
            seen_capacity: SeenEventCache::DEFAULT_CAPACITY,
            resubscribe_backoff: Duration::from_millis(200),
        }
    }

    #[must_use]
    pub fn with_account(mut self, account: ActorId) -> Self {
        self.account = Some(account);
        self
    }

    #[must_use]
    pub fn with_max_resubscribe_attempts(mut self, attempts: u32) -> Self {
        self.max_resubscribe_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_resubscribe_backoff(mut self, backoff: Duration) -> Self {
        self.resubscribe_backoff = backoff;
        self
    }
}

/// Tap statistics
#[derive(Debug, Default)]
pub struct TapStats {
    /// Events handed to the caller
    pub delivered: AtomicU64,
    /// Replayed events suppressed by the seen cache
    pub suppressed: AtomicU64,
    /// Events dropped by the program/account filter
    pub filtered: AtomicU64,
    /// Successful resubscribes after a drop
    pub resubscribes: AtomicU64,
}

/// Broadcast-log tap.
pub struct EventTap {
    transport: Arc<dyn LedgerTransport>,
    config: TapConfig,
    seen: SeenEventCache,
    rx: Option<mpsc::UnboundedReceiver<BroadcastEvent>>,
    unsubscribe: Option<Unsubscribe>,
    subscribed_once: bool,
    pending_resync: bool,
    attempts: u32,
    closed: bool,
    stats: Arc<TapStats>,
}

impl EventTap {
    #[must_use]
    pub fn new(transport: Arc<dyn LedgerTransport>, config: TapConfig) -> Self {
        Self {
            seen: SeenEventCache::with_capacity(config.seen_capacity),
            transport,
            config,
            rx: None,
            unsubscribe: None,
            subscribed_once: false,
            pending_resync: false,
            attempts: 0,
            closed: false,
            stats: Arc::new(TapStats::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> Arc<TapStats> {
        self.stats.clone()
    }

    /// Switch the tracked account. Takes effect for the next event.
    pub fn set_account(&mut self, account: Option<ActorId>) {
        debug!(account = ?account, "Tap account changed");
        self.config.account = account;
    }

    /// Whether a transport listener is currently held.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.rx.is_some()
    }

    /// Subscribe now instead of on the first `next()`.
    ///
    /// Events logged before the subscription are not delivered.
    pub fn open(&mut self) -> Result<(), TapError> {
        if self.closed {
            return Err(TapError::Closed);
        }
        if self.subscribed_once {
            return Ok(());
        }
        self.subscribe()
    }

    /// Await the next item.
    ///
    /// # Errors
    ///
    /// - `TapError::Subscribe` - the first subscription was refused
    /// - `TapError::Exhausted` - resubscribing kept failing
    /// - `TapError::Closed` - the tap was closed
    pub async fn next(&mut self) -> Result<TapItem, TapError> {
        loop {
            if self.closed {
                return Err(TapError::Closed);
            }
            if self.pending_resync {
                self.pending_resync = false;
                return Ok(TapItem::Resync);
            }

            let Some(rx) = self.rx.as_mut() else {
                self.connect().await?;
                continue;
            };

            match rx.recv().await {
                Some(event) => {
                    if let Some(item) = self.admit(event) {
                        self.attempts = 0;
                        return Ok(item);
                    }
                }
                None => {
                    warn!(program = %self.config.program, "Broadcast stream closed by transport");
                    self.release();
                }
            }
        }
    }

    /// Release the transport listener. Further `next()` calls fail.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.release();
            info!(program = %self.config.program, "Event tap closed");
        }
    }

    /// Consume the tap as a stream that ends on the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<TapItem, TapError>> {
        stream::unfold(Some(self), |tap| async move {
            let Some(mut tap) = tap else {
                return None;
            };
            match tap.next().await {
                Ok(item) => Some((Ok(item), Some(tap))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn admit(&mut self, event: BroadcastEvent) -> Option<TapItem> {
        let wanted = event.involves(&self.config.program)
            && self.config.account.map_or(true, |a| event.involves(&a));
        if !wanted {
            self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if let Err(e) = self.seen.check_and_add(event.id) {
            self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(error = %e, "Replayed event suppressed");
            return None;
        }
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        debug!(event_id = %event.id, tagged = event.reply_details.is_some(), "Event tapped");
        Some(TapItem::Event(event))
    }

    async fn connect(&mut self) -> Result<(), TapError> {
        loop {
            let first = !self.subscribed_once;
            if !first && self.attempts >= self.config.max_resubscribe_attempts {
                // Stream keeps closing without delivering anything.
                error!(attempts = self.attempts, "Giving up on broadcast log");
                return Err(TapError::Exhausted {
                    attempts: self.attempts,
                });
            }
            match self.subscribe() {
                Ok(()) => {
                    if first {
                        return Ok(());
                    }
                    self.stats.resubscribes.fetch_add(1, Ordering::Relaxed);
                    self.attempts += 1;
                    if !self.transport.supports_replay() {
                        self.pending_resync = true;
                    }
                    info!(
                        program = %self.config.program,
                        cursor = ?self.seen.high_water(),
                        attempt = self.attempts,
                        "Resubscribed to broadcast log"
                    );
                    return Ok(());
                }
                Err(e) if first => return Err(e),
                Err(e) => {
                    self.attempts += 1;
                    if self.attempts >= self.config.max_resubscribe_attempts {
                        error!(attempts = self.attempts, error = %e, "Giving up on broadcast log");
                        return Err(TapError::Exhausted {
                            attempts: self.attempts,
                        });
                    }
                    warn!(attempt = self.attempts, error = %e, "Resubscribe failed");
                    tokio::time::sleep(self.config.resubscribe_backoff * self.attempts).await;
                }
            }
        }
    }

    fn subscribe(&mut self) -> Result<(), TapError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let unsubscribe =
            self.transport
                .subscribe_broadcast(self.config.program, self.seen.high_water(), tx)?;
        self.subscribed_once = true;
        self.rx = Some(rx);
        self.unsubscribe = Some(unsubscribe);
        debug!(program = %self.config.program, "Subscribed to broadcast log");
        Ok(())
    }

    fn release(&mut self) {
        self.rx = None;
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        self.release();
    }
}
