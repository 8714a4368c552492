//! Partial reads, snapshots and field paths.

use ds_01_metadata_codec::{TypeRef, Value};
use serde::{Deserialize, Serialize};
use shared_types::entities::ActorId;
use std::collections::BTreeMap;
use std::fmt;

/// One named query against an actor's exposed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRead {
    /// Part name, unique within a cycle.
    pub name: String,
    /// Actor whose state is read.
    pub actor: ActorId,
    /// Query value, encoded with the program's state query type.
    pub query: Value,
    /// Type of the returned bytes. `None` uses the program's state type.
    pub output: Option<TypeRef>,
}

impl PartialRead {
    #[must_use]
    pub fn new(name: impl Into<String>, actor: ActorId, query: Value) -> Self {
        Self {
            name: name.into(),
            actor,
            query,
            output: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, ty: TypeRef) -> Self {
        self.output = Some(ty);
        self
    }
}

/// Immutable, versioned aggregate of one cycle's partial reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Strictly increasing across published snapshots.
    pub version: u64,
    /// Decoded part values keyed by part name.
    pub parts: BTreeMap<String, Value>,
}

impl StateSnapshot {
    #[must_use]
    pub fn new(version: u64, parts: BTreeMap<String, Value>) -> Self {
        Self { version, parts }
    }

    #[must_use]
    pub fn part(&self, name: &str) -> Option<&Value> {
        self.parts.get(name)
    }

    /// Resolve a field path against this snapshot.
    #[must_use]
    pub fn resolve(&self, path: &FieldPath) -> Option<&Value> {
        self.part(&path.part)?.lookup(path.fields.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }
}

/// Location of a value: a part name followed by field names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    pub part: String,
    pub fields: Vec<String>,
}

impl FieldPath {
    #[must_use]
    pub fn new(part: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            part: part.into(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// Parse `part.field.field`. Returns `None` for an empty part name.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = path.split('.');
        let part = segments.next().filter(|p| !p.is_empty())?;
        Some(Self {
            part: part.to_string(),
            fields: segments.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.part)?;
        for field in &self.fields {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}
