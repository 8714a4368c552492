//! Dynamic decoded values.

use serde::{Deserialize, Serialize};
use shared_types::entities::ActorId;

/// A value decoded from, or to be encoded into, a program payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Unsigned(u128),
    Signed(i128),
    Str(String),
    Bytes(Vec<u8>),
    Actor(ActorId),
    /// Elements of a sequence or fixed array.
    Sequence(Vec<Value>),
    Tuple(Vec<Value>),
    Composite(Vec<(String, Value)>),
    Variant {
        name: String,
        fields: Vec<(String, Value)>,
    },
    Option(Option<Box<Value>>),
    Result(Result<Box<Value>, Box<Value>>),
}

impl Value {
    /// The unit value.
    #[must_use]
    pub fn unit() -> Self {
        Self::Tuple(Vec::new())
    }

    /// A variant without fields.
    #[must_use]
    pub fn variant(name: impl Into<String>) -> Self {
        Self::Variant {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// A variant with named fields.
    #[must_use]
    pub fn variant_with(name: impl Into<String>, fields: Vec<(&str, Value)>) -> Self {
        Self::Variant {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    /// A composite from `(name, value)` pairs.
    #[must_use]
    pub fn composite(fields: Vec<(&str, Value)>) -> Self {
        Self::Composite(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Kind label for errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Unsigned(_) => "unsigned",
            Self::Signed(_) => "signed",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Actor(_) => "actor_id",
            Self::Sequence(_) => "sequence",
            Self::Tuple(_) => "tuple",
            Self::Composite(_) => "composite",
            Self::Variant { .. } => "variant",
            Self::Option(_) => "option",
            Self::Result(_) => "result",
        }
    }

    /// Whether the value carries no information: unit, empty composite or `None`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tuple(items) => items.is_empty(),
            Self::Composite(fields) => fields.is_empty(),
            Self::Option(inner) => inner.is_none(),
            _ => false,
        }
    }

    /// Look up a field of a composite or variant. `Some` options are
    /// looked through.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Composite(fields) | Self::Variant { fields, .. } => {
                fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            Self::Option(Some(inner)) => inner.field(name),
            _ => None,
        }
    }

    /// Follow a path of field names.
    #[must_use]
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        path.iter()
            .try_fold(self, |value, segment| value.field(segment.as_ref()))
    }

    /// Strip `Some` wrappers. `None` stays `None`.
    #[must_use]
    pub fn flatten_option(&self) -> Option<&Value> {
        match self {
            Self::Option(Some(inner)) => inner.flatten_option(),
            Self::Option(None) => None,
            other => Some(other),
        }
    }

    /// Variant name, if this is a variant.
    #[must_use]
    pub fn variant_name(&self) -> Option<&str> {
        match self.flatten_option()? {
            Self::Variant { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Unsigned integer value, if it fits in `u64`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self.flatten_option()? {
            Self::Unsigned(n) => u64::try_from(*n).ok(),
            Self::Signed(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// String value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self.flatten_option()? {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements of a sequence or tuple.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self.flatten_option()? {
            Self::Sequence(items) | Self::Tuple(items) => Some(items.len()),
            Self::Composite(fields) => Some(fields.len()),
            _ => None,
        }
    }
}
