//! Type descriptors carried in program metadata.
//!
//! Shapes live in a flat table and refer to each other by index, so
//! recursive and shared types need no boxing.

use serde::{Deserialize, Serialize};

/// Index into [`ProgramMetadata::types`](super::metadata::ProgramMetadata).
pub type TypeRef = u32;

/// A named field of a composite or variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name. Empty for positional fields.
    pub name: String,
    /// Field type.
    pub ty: TypeRef,
}

impl Field {
    /// Create a named field.
    #[must_use]
    pub fn named(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// One alternative of a variant type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    /// Variant name, unique within its type.
    pub name: String,
    /// Wire index, unique within its type.
    pub index: u8,
    /// Payload fields in wire order.
    pub fields: Vec<Field>,
}

impl VariantDef {
    /// Create a variant without fields.
    #[must_use]
    pub fn unit(name: impl Into<String>, index: u8) -> Self {
        Self {
            name: name.into(),
            index,
            fields: Vec::new(),
        }
    }

    /// Create a variant with fields.
    #[must_use]
    pub fn with_fields(name: impl Into<String>, index: u8, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            index,
            fields,
        }
    }
}

/// Type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    /// UTF-8 string with compact length prefix.
    Str,
    /// Byte vector with compact length prefix.
    Bytes,
    /// 32-byte actor identifier.
    ActorId,
    /// Variable-length sequence with compact length prefix.
    Sequence(TypeRef),
    /// Fixed-length array, no prefix.
    Array { element: TypeRef, len: u32 },
    /// Positional tuple. The empty tuple is the unit type.
    Tuple(Vec<TypeRef>),
    /// Struct with named fields.
    Composite(Vec<Field>),
    /// Tagged union.
    Variant(Vec<VariantDef>),
    /// Optional value, one tag byte.
    Option(TypeRef),
    /// Success or error, one tag byte.
    Result { ok: TypeRef, err: TypeRef },
    /// A type declared by the program that this codec cannot handle.
    Opaque(String),
}

impl Shape {
    /// Short label for errors and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::ActorId => "actor_id",
            Self::Sequence(_) => "sequence",
            Self::Array { .. } => "array",
            Self::Tuple(_) => "tuple",
            Self::Composite(_) => "composite",
            Self::Variant(_) => "variant",
            Self::Option(_) => "option",
            Self::Result { .. } => "result",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Type references this shape points to.
    #[must_use]
    pub fn children(&self) -> Vec<TypeRef> {
        match self {
            Self::Sequence(t) | Self::Option(t) | Self::Array { element: t, .. } => vec![*t],
            Self::Tuple(items) => items.clone(),
            Self::Composite(fields) => fields.iter().map(|f| f.ty).collect(),
            Self::Variant(variants) => variants
                .iter()
                .flat_map(|v| v.fields.iter().map(|f| f.ty))
                .collect(),
            Self::Result { ok, err } => vec![*ok, *err],
            _ => Vec::new(),
        }
    }

    /// Variant names, if this is a variant shape.
    #[must_use]
    pub fn variant_names(&self) -> Option<Vec<&str>> {
        match self {
            Self::Variant(variants) => Some(variants.iter().map(|v| v.name.as_str()).collect()),
            _ => None,
        }
    }
}
