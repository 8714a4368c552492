//! Error types for the metadata and codec subsystem

use crate::domain::shape::TypeRef;
use thiserror::Error;

/// Errors from loading program metadata.
///
/// Never retried internally; the caller decides whether to try again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// The blob could not be fetched from its source.
    #[error("Metadata fetch failed from {source_name}: {reason}")]
    Fetch { source_name: String, reason: String },

    /// The blob was fetched but is malformed or inconsistent.
    #[error("Metadata parse failed: {0}")]
    Parse(String),
}

/// Errors from encoding or decoding payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The type is unknown or the codec cannot handle it.
    #[error("Unsupported shape for type {ty}: {reason}")]
    UnsupportedShape { ty: TypeRef, reason: String },

    /// The metadata declares no type for the requested entry point.
    #[error("Metadata has no {0} type")]
    MissingEntryPoint(&'static str),

    /// The value does not have the kind the shape requires.
    #[error("Type mismatch: expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the declared width.
    #[error("Value {value} out of range for {ty}")]
    OutOfRange { ty: &'static str, value: String },

    /// Composite, variant or array arity differs from the shape.
    #[error("Arity mismatch: expected {expected}, found {found}")]
    Arity { expected: usize, found: usize },

    /// A field name differs from the shape.
    #[error("Field mismatch: expected `{expected}`, found `{found}`")]
    FieldName { expected: String, found: String },

    /// Input ended before the value was complete.
    #[error("Unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// Input had bytes left after the value.
    #[error("{count} trailing bytes after value")]
    TrailingBytes { count: usize },

    /// A tag byte (bool, option, result) was out of range.
    #[error("Invalid {kind} tag {tag}")]
    InvalidTag { kind: &'static str, tag: u8 },

    /// No variant with this index exists.
    #[error("Unknown variant index {0}")]
    UnknownVariantIndex(u8),

    /// No variant with this name exists.
    #[error("Unknown variant `{0}`")]
    UnknownVariantName(String),

    /// A decoded variant is outside the decoder's known set.
    #[error("Unrecognized message variant `{0}`")]
    UnrecognizedVariant(String),

    /// A length prefix exceeds what the input can hold.
    #[error("Length prefix {len} exceeds input bounds")]
    LengthOverflow { len: u64 },

    /// String bytes were not valid UTF-8.
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    /// Nesting is deeper than the decoder allows.
    #[error("Nesting deeper than {0} levels")]
    DepthExceeded(usize),
}

impl CodecError {
    /// Whether this error arose while reading bytes rather than from a
    /// shape or value problem.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. }
                | Self::TrailingBytes { .. }
                | Self::InvalidTag { .. }
                | Self::UnknownVariantIndex(_)
                | Self::LengthOverflow { .. }
                | Self::InvalidUtf8
                | Self::DepthExceeded(_)
        )
    }
}
