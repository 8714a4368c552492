//! Shared fixtures: a small lobby game program and a ledger seeded with its
//! state.

use ds_01_metadata_codec::{
    Codec, EntryPoints, Field, ProgramMetadata, Shape, StaticMetadataSource, TypeRef, Value,
    VariantDef,
};
use ds_03_action_dispatch::StaticSigner;
use ds_04_state_sync::{FieldPath, PartialRead, ReconcileSpec};
use session_runtime::{Session, SessionConfig};
use shared_bus::{InMemoryLedger, LogMessage};
use shared_types::entities::{ActorId, CorrelationId, ReplyDetails};
use shared_types::ledger::LedgerTransport;
use std::sync::Arc;
use std::time::Duration;

pub const PROGRAM: ActorId = ActorId::new([0x11; 32]);
pub const PLAYER: ActorId = ActorId::new([0x22; 32]);
pub const STRANGER: ActorId = ActorId::new([0x33; 32]);

pub const ACTION: TypeRef = 3;
pub const EVENT: TypeRef = 4;
pub const PLAYERS: TypeRef = 8;
pub const STATUS: TypeRef = 9;

/// Parts read every cycle, in query-variant order.
pub const PARTS: [&str; 5] = ["status", "players", "config", "round", "admins"];

pub const WAIT: Duration = Duration::from_secs(5);

pub fn metadata() -> ProgramMetadata {
    ProgramMetadata::new(
        vec![
            /* 0 */ Shape::U8,
            /* 1 */ Shape::U64,
            /* 2 */ Shape::Str,
            /* 3 */
            Shape::Variant(vec![
                VariantDef::with_fields("Register", 0, vec![Field::named("name", 2)]),
                VariantDef::with_fields("Move", 1, vec![Field::named("cell", 0)]),
                VariantDef::unit("StartGame", 2),
            ]),
            /* 4 */
            Shape::Variant(vec![
                VariantDef::with_fields("Registered", 0, vec![Field::named("name", 2)]),
                VariantDef::with_fields("Moved", 1, vec![Field::named("cell", 0)]),
                VariantDef::unit("GameStarted", 2),
            ]),
            /* 5 */
            Shape::Variant(
                ["Status", "Players", "Config", "Round", "Admins"]
                    .iter()
                    .enumerate()
                    .map(|(i, name)| VariantDef::unit(*name, i as u8))
                    .collect(),
            ),
            /* 6 */
            Shape::Variant(vec![
                VariantDef::unit("Registration", 0),
                VariantDef::unit("Active", 1),
                VariantDef::unit("Resolving", 2),
                VariantDef::unit("Over", 3),
            ]),
            /* 7 */ Shape::Option(2),
            /* 8 */ Shape::Sequence(2),
            /* 9 */
            Shape::Composite(vec![
                Field::named("phase", 6),
                Field::named("pairing", 1),
                Field::named("deadline", 1),
                Field::named("overlay", 7),
            ]),
        ],
        EntryPoints {
            handle_input: Some(ACTION),
            handle_output: Some(EVENT),
            state_query: Some(5),
            state_output: Some(1),
        },
    )
}

pub fn codec() -> Codec {
    Codec::new(Arc::new(metadata()))
}

fn query_variant(part: &str) -> &'static str {
    match part {
        "status" => "Status",
        "players" => "Players",
        "config" => "Config",
        "round" => "Round",
        _ => "Admins",
    }
}

pub fn query(part: &str) -> Vec<u8> {
    codec()
        .encode_state_query(&Value::variant(query_variant(part)))
        .unwrap()
}

pub fn reads() -> Vec<PartialRead> {
    PARTS
        .iter()
        .map(|part| {
            let read = PartialRead::new(*part, PROGRAM, Value::variant(query_variant(part)));
            match *part {
                "status" => read.with_output(STATUS),
                "players" => read.with_output(PLAYERS),
                _ => read,
            }
        })
        .collect()
}

pub fn reconcile_spec() -> ReconcileSpec {
    ReconcileSpec::default()
        .with_phase(FieldPath::new("status", &["phase"]))
        .with_pairing(
            FieldPath::new("status", &["pairing"]),
            FieldPath::new("players", &[]),
        )
        .with_overlay(FieldPath::new("status", &["overlay"]))
        .with_countdown(FieldPath::new("status", &["deadline"]))
}

/// Program state as the ledger holds it.
#[derive(Debug, Clone)]
pub struct GameState {
    pub phase: &'static str,
    pub pairing: u64,
    pub deadline: u64,
    pub overlay: Option<&'static str>,
    pub players: Vec<&'static str>,
    pub round: u64,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: "Registration",
            pairing: 0,
            deadline: 100,
            overlay: None,
            players: vec!["ada", "bob"],
            round: 1,
        }
    }
}

impl GameState {
    pub fn write(&self, ledger: &InMemoryLedger) {
        let codec = codec();
        let status = Value::composite(vec![
            ("phase", Value::variant(self.phase)),
            ("pairing", Value::Unsigned(self.pairing.into())),
            ("deadline", Value::Unsigned(self.deadline.into())),
            (
                "overlay",
                Value::Option(self.overlay.map(|s| Box::new(Value::Str(s.into())))),
            ),
        ]);
        let players = Value::Sequence(self.players.iter().map(|p| Value::Str((*p).into())).collect());

        ledger.set_state(PROGRAM, query("status"), codec.encode(STATUS, &status).unwrap());
        ledger.set_state(PROGRAM, query("players"), codec.encode(PLAYERS, &players).unwrap());
        ledger.set_state(PROGRAM, query("config"), 7u64.to_le_bytes().to_vec());
        ledger.set_state(PROGRAM, query("round"), self.round.to_le_bytes().to_vec());
        ledger.set_state(PROGRAM, query("admins"), 1u64.to_le_bytes().to_vec());
    }
}

pub fn seeded_ledger(state: &GameState) -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new());
    state.write(&ledger);
    ledger
}

pub fn move_action(cell: u8) -> Value {
    Value::variant_with("Move", vec![("cell", Value::Unsigned(cell.into()))])
}

pub fn moved_payload(cell: u8) -> Vec<u8> {
    codec()
        .encode(
            EVENT,
            &Value::variant_with("Moved", vec![("cell", Value::Unsigned(cell.into()))]),
        )
        .unwrap()
}

/// The ledger's automatic acknowledgement for `id`.
pub fn ack(id: CorrelationId) -> LogMessage {
    LogMessage::new(PROGRAM, PLAYER, vec![]).replying(ReplyDetails {
        in_reply_to: id,
        status_code: 0,
    })
}

/// A failed reply for `id` carrying `message`.
pub fn failure(id: CorrelationId, message: &str) -> LogMessage {
    let payload = codec().encode(2, &Value::Str(message.into())).unwrap();
    LogMessage::new(PROGRAM, PLAYER, payload).replying(ReplyDetails {
        in_reply_to: id,
        status_code: 1,
    })
}

/// An untagged business reply to the player.
pub fn business_reply(payload: Vec<u8>) -> LogMessage {
    LogMessage::new(PROGRAM, PLAYER, payload)
}

pub fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_program(PROGRAM)
        .with_poll_interval(Duration::from_millis(40))
        .with_retry_interval(Duration::from_millis(20))
}

/// Poll once at start, then only on demand.
pub fn quiet_config() -> SessionConfig {
    fast_config().with_poll_interval(Duration::from_secs(600))
}

pub fn session(ledger: &Arc<InMemoryLedger>, config: SessionConfig) -> Session {
    let transport: Arc<dyn LedgerTransport> = ledger.clone();
    let blob = metadata().to_blob().unwrap();
    Session::new(config, transport)
        .with_metadata_source(Arc::new(StaticMetadataSource::new("lobby-game", blob)))
        .with_signer(Arc::new(StaticSigner::new(PLAYER)))
        .with_reads(reads())
        .with_reconcile(reconcile_spec())
}
