//! Tagged-variant classification of decoded replies.
//!
//! Replies are classified into a closed set of known variants at decode
//! time. Anything outside the set is a decode error, so consumers match on
//! [`ProgramReply::variant`] instead of probing fields.

use super::codec::Codec;
use super::shape::{Shape, TypeRef};
use super::value::Value;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A decoded business reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramReply {
    /// Variant name, always one of the decoder's known variants.
    pub variant: String,
    /// The full decoded variant value.
    pub value: Value,
}

impl ProgramReply {
    /// Look up a field of the reply variant.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.value.field(name)
    }
}

/// Decodes raw reply payloads for one pending call.
pub trait PayloadDecoder: Send + Sync {
    /// Decode `payload`.
    ///
    /// Returns `Ok(None)` when the payload decodes to an empty value.
    fn decode(&self, payload: &[u8]) -> Result<Option<ProgramReply>, CodecError>;
}

/// Decoder for variant-typed replies (or `Option` of a variant).
#[derive(Debug, Clone)]
pub struct VariantDecoder {
    codec: Codec,
    ty: TypeRef,
    known: BTreeSet<String>,
}

impl VariantDecoder {
    /// Decode with type `ty`, accepting every variant it declares.
    pub fn new(codec: Codec, ty: TypeRef) -> Result<Self, CodecError> {
        let known = variant_set(&codec, ty)?;
        Ok(Self { codec, ty, known })
    }

    /// Decode with the program's reply type.
    pub fn for_replies(codec: Codec) -> Result<Self, CodecError> {
        let ty = codec
            .metadata()
            .entry
            .handle_output
            .ok_or(CodecError::MissingEntryPoint("handle_output"))?;
        Self::new(codec, ty)
    }

    /// Narrow the accepted variants to `names`.
    pub fn only(mut self, names: &[&str]) -> Result<Self, CodecError> {
        if let Some(missing) = names.iter().find(|n| !self.known.contains(**n)) {
            return Err(CodecError::UnknownVariantName((*missing).to_string()));
        }
        self.known = names.iter().map(|n| (*n).to_string()).collect();
        Ok(self)
    }

    /// Accepted variant names.
    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }
}

impl PayloadDecoder for VariantDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Option<ProgramReply>, CodecError> {
        let value = self.codec.decode(self.ty, payload)?;
        if value.is_empty() {
            return Ok(None);
        }
        let Some(inner) = value.flatten_option() else {
            return Ok(None);
        };
        let variant = inner.variant_name().ok_or(CodecError::Mismatch {
            expected: "variant",
            found: inner.kind(),
        })?;
        if !self.known.contains(variant) {
            return Err(CodecError::UnrecognizedVariant(variant.to_string()));
        }
        Ok(Some(ProgramReply {
            variant: variant.to_string(),
            value: inner.clone(),
        }))
    }
}

fn variant_set(codec: &Codec, ty: TypeRef) -> Result<BTreeSet<String>, CodecError> {
    let metadata = codec.metadata();
    let target = match metadata.shape(ty)? {
        Shape::Option(inner) => *inner,
        _ => ty,
    };
    match metadata.shape(target)? {
        Shape::Variant(variants) => Ok(variants.iter().map(|v| v.name.clone()).collect()),
        other => Err(CodecError::UnsupportedShape {
            ty,
            reason: format!("reply type must be a variant, found {}", other.label()),
        }),
    }
}
