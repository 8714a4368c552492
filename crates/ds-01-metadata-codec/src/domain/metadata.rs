//! Program metadata: the type table and entry points of one program.
//!
//! ## Blob format
//!
//! A metadata blob is the bincode encoding of [`ProgramMetadata`]. Programs
//! usually ship it as hex text (`meta.txt`), so [`ProgramMetadata::from_blob`]
//! accepts either raw bytes or hex with an optional `0x` prefix.

use super::shape::{Shape, TypeRef};
use crate::error::{CodecError, MetadataError};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metadata format version understood by this codec.
pub const METADATA_VERSION: u16 = 1;

/// Upper bound on blob size accepted by the parser.
pub const MAX_BLOB_BYTES: u64 = 4 * 1024 * 1024;

fn blob_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_BLOB_BYTES)
}

/// Entry point types of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoints {
    /// Type of action payloads sent to the program.
    pub handle_input: Option<TypeRef>,
    /// Type of business replies the program emits.
    pub handle_output: Option<TypeRef>,
    /// Type of state query payloads.
    pub state_query: Option<TypeRef>,
    /// Type of state read results.
    pub state_output: Option<TypeRef>,
}

/// Parsed program metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMetadata {
    /// Format version.
    pub version: u16,
    /// Type table indexed by [`TypeRef`].
    pub types: Vec<Shape>,
    /// Entry point types.
    pub entry: EntryPoints,
}

impl ProgramMetadata {
    /// Create metadata with the current format version.
    #[must_use]
    pub fn new(types: Vec<Shape>, entry: EntryPoints) -> Self {
        Self {
            version: METADATA_VERSION,
            types,
            entry,
        }
    }

    /// Parse and validate a blob (raw or hex).
    pub fn from_blob(blob: &[u8]) -> Result<Self, MetadataError> {
        let raw = match hex_text(blob) {
            Some(digits) => {
                hex::decode(digits).map_err(|e| MetadataError::Parse(format!("bad hex: {e}")))?
            }
            None => blob.to_vec(),
        };

        let metadata: Self = blob_options()
            .deserialize(&raw)
            .map_err(|e| MetadataError::Parse(e.to_string()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Serialize to the raw blob format.
    pub fn to_blob(&self) -> Result<Vec<u8>, MetadataError> {
        blob_options()
            .serialize(self)
            .map_err(|e| MetadataError::Parse(e.to_string()))
    }

    /// Serialize to `0x`-prefixed hex text.
    pub fn to_hex(&self) -> Result<String, MetadataError> {
        Ok(format!("0x{}", hex::encode(self.to_blob()?)))
    }

    /// Check version, type references, variant uniqueness and that every
    /// type has a finite value.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.version != METADATA_VERSION {
            return Err(MetadataError::Parse(format!(
                "unsupported metadata version {} (expected {METADATA_VERSION})",
                self.version
            )));
        }

        let count = self.types.len();
        let in_range = |ty: TypeRef| (ty as usize) < count;

        for (index, shape) in self.types.iter().enumerate() {
            if let Some(bad) = shape.children().into_iter().find(|t| !in_range(*t)) {
                return Err(MetadataError::Parse(format!(
                    "type {index} references missing type {bad}"
                )));
            }

            if let Shape::Variant(variants) = shape {
                let mut names = HashSet::new();
                let mut indices = HashSet::new();
                for variant in variants {
                    if !names.insert(variant.name.as_str()) {
                        return Err(MetadataError::Parse(format!(
                            "type {index} repeats variant name `{}`",
                            variant.name
                        )));
                    }
                    if !indices.insert(variant.index) {
                        return Err(MetadataError::Parse(format!(
                            "type {index} repeats variant index {}",
                            variant.index
                        )));
                    }
                }
            }
        }

        if let Some(index) = self.infinite_types().first() {
            return Err(MetadataError::Parse(format!(
                "type {index} contains itself with no finite value"
            )));
        }

        let entries = [
            ("handle_input", self.entry.handle_input),
            ("handle_output", self.entry.handle_output),
            ("state_query", self.entry.state_query),
            ("state_output", self.entry.state_output),
        ];
        for (name, ty) in entries {
            if let Some(ty) = ty {
                if !in_range(ty) {
                    return Err(MetadataError::Parse(format!(
                        "{name} references missing type {ty}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Types whose every value would contain itself, such as a tuple holding
    /// its own type. Assumes references are in range.
    fn infinite_types(&self) -> Vec<usize> {
        let mut finite = vec![false; self.types.len()];
        loop {
            let mut changed = false;
            for (index, shape) in self.types.iter().enumerate() {
                if !finite[index] && has_finite_value(shape, &finite) {
                    finite[index] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        finite
            .iter()
            .enumerate()
            .filter_map(|(index, ok)| (!ok).then_some(index))
            .collect()
    }

    /// Resolve a type reference.
    pub fn shape(&self, ty: TypeRef) -> Result<&Shape, CodecError> {
        self.types
            .get(ty as usize)
            .ok_or_else(|| CodecError::UnsupportedShape {
                ty,
                reason: "type index out of range".into(),
            })
    }
}

fn has_finite_value(shape: &Shape, finite: &[bool]) -> bool {
    let known = |ty: TypeRef| finite.get(ty as usize).copied().unwrap_or(false);
    match shape {
        Shape::Array { len: 0, .. } => true,
        Shape::Array { element, .. } => known(*element),
        Shape::Tuple(types) => types.iter().all(|t| known(*t)),
        Shape::Composite(fields) => fields.iter().all(|f| known(f.ty)),
        Shape::Variant(variants) => {
            variants.is_empty() || variants.iter().any(|v| v.fields.iter().all(|f| known(f.ty)))
        }
        Shape::Result { ok, err } => known(*ok) || known(*err),
        // Empty sequences and `None` end any recursion.
        _ => true,
    }
}

/// Hex digits of `blob` if it is hex text, without prefix and whitespace.
fn hex_text(blob: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(blob).ok()?.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit())).then_some(digits)
}
