//! Session assembly and the handle hosts hold while it runs.

use crate::container::{ConfigError, EngineStore, SessionConfig};
use crate::error::SessionError;
use crate::wiring::{Scheduler, SchedulerControl, SettlementObserver};
use ds_01_metadata_codec::{
    FileMetadataSource, MetadataLoader, MetadataSource, PayloadDecoder, Value,
};
use ds_02_reply_correlator::{CorrelatorConfig, EventTap, PendingSet, ReplyCorrelator, TapConfig};
use ds_03_action_dispatch::{
    ActionDispatcher, DispatchError, DispatchOptions, DispatchedCall, DispatcherConfig, GasPolicy,
    Signer,
};
use ds_04_state_sync::{
    PartialRead, PhaseTable, ReconcileSpec, Reconciler, SideEffect, SnapshotRef,
    StateSnapshotAggregator,
};
use ds_telemetry::{CALLS_DISPATCHED, DISPATCH_FAILURES};
use shared_types::entities::{ActorId, SessionId};
use shared_types::ledger::LedgerTransport;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything needed to start one session.
pub struct Session {
    config: SessionConfig,
    transport: Arc<dyn LedgerTransport>,
    metadata: Option<Arc<dyn MetadataSource>>,
    reply_decoder: Option<Arc<dyn PayloadDecoder>>,
    signer: Option<Arc<dyn Signer>>,
    reads: Vec<PartialRead>,
    phase_table: PhaseTable,
    reconcile: ReconcileSpec,
    store: Arc<EngineStore>,
}

impl Session {
    pub fn new(config: SessionConfig, transport: Arc<dyn LedgerTransport>) -> Self {
        Self {
            config,
            transport,
            metadata: None,
            reply_decoder: None,
            signer: None,
            reads: Vec::new(),
            phase_table: PhaseTable::default(),
            reconcile: ReconcileSpec::default(),
            store: Arc::new(EngineStore::new()),
        }
    }

    /// Load metadata from `source` instead of `config.metadata_path`.
    #[must_use]
    pub fn with_metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// Decode business replies with `decoder` instead of every variant of
    /// the program's output type.
    #[must_use]
    pub fn with_reply_decoder(mut self, decoder: Arc<dyn PayloadDecoder>) -> Self {
        self.reply_decoder = Some(decoder);
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    #[must_use]
    pub fn with_reads(mut self, reads: Vec<PartialRead>) -> Self {
        self.reads = reads;
        self
    }

    #[must_use]
    pub fn with_phase_table(mut self, table: PhaseTable) -> Self {
        self.phase_table = table;
        self
    }

    #[must_use]
    pub fn with_reconcile(mut self, spec: ReconcileSpec) -> Self {
        self.reconcile = spec;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<EngineStore>) -> Self {
        self.store = store;
        self
    }

    /// Load metadata, wire every component and spawn the scheduler.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `SessionError::Config` - invalid configuration or no metadata location
    /// - `SessionError::Metadata` - the blob could not be fetched or parsed
    /// - `SessionError::Codec` - the metadata declares no reply variant type
    /// - `SessionError::Tap` - the broadcast subscription was refused
    pub async fn start(self) -> Result<SessionHandle, SessionError> {
        self.config.validate()?;
        let program = self.config.program_id()?;
        if let Err(e) = ds_telemetry::register_metrics() {
            warn!(error = %e, "Metrics registration failed");
        }

        let source: Arc<dyn MetadataSource> = match self.metadata {
            Some(source) => source,
            None => {
                let path = self
                    .config
                    .metadata_path
                    .clone()
                    .ok_or(ConfigError::MissingMetadata)?;
                Arc::new(FileMetadataSource::new(path))
            }
        };
        let codec = MetadataLoader::new(source).codec().await?;

        let session = SessionId::new();
        let refresh = Arc::new(Notify::new());

        let correlator = Arc::new(ReplyCorrelator::new(
            CorrelatorConfig::new(program)
                .with_max_retries(self.config.max_retries)
                .with_history_capacity(self.config.history_capacity),
        ));
        correlator.add_observer(Arc::new(SettlementObserver::new(refresh.clone())));

        let dispatcher = Arc::new(ActionDispatcher::new(
            DispatcherConfig {
                max_gas: self.config.max_gas,
            },
            session,
            self.transport.clone(),
            correlator.clone(),
        ));
        match self.reply_decoder {
            Some(decoder) => dispatcher.install(codec.clone(), decoder),
            None => dispatcher.set_codec(codec.clone())?,
        }
        let account = self.signer.as_ref().map(|s| s.account());
        dispatcher.set_signer(self.signer);

        let mut tap_config = TapConfig::new(program)
            .with_max_resubscribe_attempts(self.config.max_resubscribe_attempts);
        if let Some(account) = account {
            tap_config = tap_config.with_account(account);
        }
        let mut tap = EventTap::new(self.transport.clone(), tap_config);
        tap.open()?;

        if self.reads.is_empty() {
            warn!(session = %session, "Session has no partial reads; snapshots will not publish");
        }
        let aggregator = Arc::new(StateSnapshotAggregator::new(
            self.transport.clone(),
            codec,
            self.store.snapshots().clone(),
            self.reads,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (account_tx, account_rx) = watch::channel(account);
        let scheduler = Scheduler {
            session,
            program,
            transport: self.transport,
            tap,
            correlator: correlator.clone(),
            aggregator: aggregator.clone(),
            reconciler: Reconciler::new(self.phase_table, self.reconcile),
            store: self.store.clone(),
            poll_interval: self.config.poll_interval,
            retry_interval: self.config.retry_interval,
        };
        let task = tokio::spawn(scheduler.run(SchedulerControl {
            shutdown: shutdown_rx,
            account: account_rx,
            refresh: refresh.clone(),
        }));

        info!(
            session = %session,
            program = %program,
            account = ?account,
            reads = aggregator.reads().len(),
            "Session started"
        );

        Ok(SessionHandle {
            session,
            program,
            config: self.config,
            dispatcher,
            correlator,
            aggregator,
            store: self.store,
            refresh,
            shutdown: shutdown_tx,
            account: account_tx,
            task,
        })
    }
}

/// A running session.
///
/// Dropping the handle stops the scheduler the same way
/// [`shutdown`](Self::shutdown) does, without waiting for it.
pub struct SessionHandle {
    session: SessionId,
    program: ActorId,
    config: SessionConfig,
    dispatcher: Arc<ActionDispatcher>,
    correlator: Arc<ReplyCorrelator>,
    aggregator: Arc<StateSnapshotAggregator>,
    store: Arc<EngineStore>,
    refresh: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    account: watch::Sender<Option<ActorId>>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn program(&self) -> ActorId {
        self.program
    }

    #[must_use]
    pub fn store(&self) -> &Arc<EngineStore> {
        &self.store
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub fn correlator(&self) -> &Arc<ReplyCorrelator> {
        &self.correlator
    }

    #[must_use]
    pub fn aggregator(&self) -> &Arc<StateSnapshotAggregator> {
        &self.aggregator
    }

    /// Dispatch options carrying the configured gas margin.
    #[must_use]
    pub fn default_options(&self) -> DispatchOptions {
        DispatchOptions::default().with_gas(GasPolicy::Estimated {
            margin_percent: self.config.gas_margin_percent,
        })
    }

    /// Send `action` to the session's program.
    pub async fn dispatch_action(
        &self,
        action: &Value,
        options: DispatchOptions,
    ) -> Result<DispatchedCall, DispatchError> {
        self.dispatch_to(self.program, action, options).await
    }

    /// Send `action` to an arbitrary destination.
    pub async fn dispatch_to(
        &self,
        destination: ActorId,
        action: &Value,
        options: DispatchOptions,
    ) -> Result<DispatchedCall, DispatchError> {
        let result = self.dispatcher.dispatch(destination, action, options).await;
        match &result {
            Ok(_) => CALLS_DISPATCHED.inc(),
            Err(e) => DISPATCH_FAILURES.with_label_values(&[e.reason()]).inc(),
        }
        result
    }

    #[must_use]
    pub fn current_snapshot(&self) -> SnapshotRef {
        self.store.current_snapshot()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SnapshotRef> {
        self.store.subscribe_snapshots()
    }

    pub fn side_effects(&self) -> broadcast::Receiver<SideEffect> {
        self.store.subscribe_effects()
    }

    pub fn pending(&self) -> watch::Receiver<Arc<PendingSet>> {
        self.store.subscribe_pending()
    }

    /// Ask for an aggregation cycle now.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Replace or clear the signing identity.
    ///
    /// Calls dispatched under the previous identity are abandoned. Returns
    /// how many there were.
    pub fn switch_account(&self, signer: Option<Arc<dyn Signer>>) -> usize {
        let account = signer.as_ref().map(|s| s.account());
        self.dispatcher.set_signer(signer);
        let abandoned = self.correlator.abandon(self.session);
        self.account.send_replace(account);
        abandoned
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the scheduler and wait for it.
    ///
    /// The tap is closed and every pending call is abandoned; their outcome
    /// futures yield `CallError::Abandoned`.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        info!(session = %self.session, "Session shutting down");
        // Err only if the scheduler already exited.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| SessionError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_01_metadata_codec::{
        Codec, EntryPoints, Field, ProgramMetadata, Shape, StaticMetadataSource, VariantDef,
    };
    use ds_02_reply_correlator::CallError;
    use ds_03_action_dispatch::StaticSigner;
    use shared_bus::InMemoryLedger;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn program() -> ActorId {
        ActorId::new([1; 32])
    }

    fn player() -> ActorId {
        ActorId::new([2; 32])
    }

    fn metadata() -> ProgramMetadata {
        ProgramMetadata::new(
            vec![
                /* 0 */ Shape::U8,
                /* 1 */ Shape::U32,
                /* 2 */
                Shape::Variant(vec![
                    VariantDef::unit("Register", 0),
                    VariantDef::with_fields("Move", 1, vec![Field::named("cell", 0)]),
                ]),
                /* 3 */
                Shape::Variant(vec![
                    VariantDef::unit("Registered", 0),
                    VariantDef::with_fields("Moved", 1, vec![Field::named("cell", 0)]),
                ]),
                /* 4 */ Shape::Variant(vec![VariantDef::unit("Round", 0)]),
            ],
            EntryPoints {
                handle_input: Some(2),
                handle_output: Some(3),
                state_query: Some(4),
                state_output: Some(1),
            },
        )
    }

    fn config() -> SessionConfig {
        SessionConfig::default()
            .with_program(program())
            .with_poll_interval(Duration::from_millis(50))
            .with_retry_interval(Duration::from_millis(50))
    }

    fn seeded_ledger() -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new());
        let codec = Codec::new(Arc::new(metadata()));
        let query = codec.encode_state_query(&Value::variant("Round")).unwrap();
        ledger.set_state(program(), query, 5u32.to_le_bytes().to_vec());
        ledger
    }

    fn session(ledger: &Arc<InMemoryLedger>) -> Session {
        let transport: Arc<dyn LedgerTransport> = ledger.clone();
        let blob = metadata().to_blob().unwrap();
        Session::new(config(), transport)
            .with_metadata_source(Arc::new(StaticMetadataSource::new("test", blob)))
            .with_signer(Arc::new(StaticSigner::new(player())))
            .with_reads(vec![PartialRead::new("round", program(), Value::variant("Round"))])
    }

    #[tokio::test]
    async fn test_start_requires_program() {
        let ledger: Arc<dyn LedgerTransport> = Arc::new(InMemoryLedger::new());
        let err = Session::new(SessionConfig::default(), ledger)
            .start()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Config(ConfigError::MissingProgram)));
    }

    #[tokio::test]
    async fn test_start_requires_metadata_location() {
        let ledger: Arc<dyn LedgerTransport> = Arc::new(InMemoryLedger::new());
        let err = Session::new(config(), ledger).start().await.err().unwrap();
        assert!(matches!(err, SessionError::Config(ConfigError::MissingMetadata)));
    }

    #[tokio::test]
    async fn test_metadata_loaded_from_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.txt");
        std::fs::write(&path, metadata().to_hex().unwrap()).unwrap();

        let ledger = seeded_ledger();
        let transport: Arc<dyn LedgerTransport> = ledger.clone();
        let handle = Session::new(config().with_metadata_path(&path), transport)
            .with_reads(vec![PartialRead::new("round", program(), Value::variant("Round"))])
            .start()
            .await
            .unwrap();

        let mut snapshots = handle.subscribe_snapshots();
        timeout(WAIT, snapshots.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_first_poll_publishes_snapshot() {
        let ledger = seeded_ledger();
        let handle = session(&ledger).start().await.unwrap();

        let mut snapshots = handle.subscribe_snapshots();
        timeout(WAIT, snapshots.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();

        let snapshot = handle.current_snapshot().unwrap();
        assert_eq!(snapshot.part("round").and_then(Value::as_u64), Some(5));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_abandons_pending_calls() {
        let ledger = seeded_ledger();
        let handle = session(&ledger).start().await.unwrap();

        let call = handle
            .dispatch_action(&Value::variant("Register"), handle.default_options())
            .await
            .unwrap();
        assert!(handle.correlator().is_pending(&call.correlation_id));

        handle.shutdown().await.unwrap();
        assert_eq!(call.outcome.await, Err(CallError::Abandoned));
    }

    #[tokio::test]
    async fn test_switch_account_abandons_and_clears_identity() {
        let ledger = seeded_ledger();
        let handle = session(&ledger).start().await.unwrap();

        let call = handle
            .dispatch_action(&Value::variant("Register"), handle.default_options())
            .await
            .unwrap();
        assert_eq!(handle.switch_account(None), 1);
        assert_eq!(call.outcome.await, Err(CallError::Abandoned));

        let err = handle
            .dispatch_action(&Value::variant("Register"), handle.default_options())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotReady { .. }));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ticks_time_out_silent_call() {
        let ledger = seeded_ledger();
        let handle = session(&ledger).start().await.unwrap();

        let started = tokio::time::Instant::now();
        let call = handle
            .dispatch_action(&Value::variant("Register"), handle.default_options().with_retries(3))
            .await
            .unwrap();
        assert_eq!(call.outcome.await, Err(CallError::Timeout { retries: 3 }));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(handle.correlator().pending_count(), 0);

        handle.shutdown().await.unwrap();
    }
}
