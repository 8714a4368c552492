//! Dynamic payload codec.
//!
//! ## Wire format
//!
//! - Integers: little-endian, fixed width
//! - `bool`, option and result: one tag byte
//! - Strings, bytes and sequences: compact length prefix
//! - Variants: one index byte followed by the fields in order
//! - Arrays, tuples and composites: fields in order, no prefix
//!
//! ## Invariants
//!
//! - `decode(ty, encode(ty, v)) == v` for every `v` representable by `ty`
//! - Decoding consumes the whole input; leftovers are an error
//! - Length prefixes are bounded by the remaining input
//! - A type met again on the same path without consuming input is an error

use super::metadata::ProgramMetadata;
use super::shape::{Field, Shape, TypeRef};
use super::value::Value;
use crate::error::CodecError;
use shared_types::entities::ActorId;
use std::sync::Arc;

/// Maximum nesting depth accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

/// Maximum element count for sequences of zero-sized elements.
pub const MAX_ZERO_SIZED_LEN: usize = 1 << 16;

/// Encode `value` as type `ty`.
pub fn encode(metadata: &ProgramMetadata, ty: TypeRef, value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    Encoder { metadata, out: &mut out }.value(ty, value, 0)?;
    Ok(out)
}

/// Decode `bytes` as type `ty`, consuming all of it.
pub fn decode(metadata: &ProgramMetadata, ty: TypeRef, bytes: &[u8]) -> Result<Value, CodecError> {
    let mut reader = Reader::new(metadata, bytes);
    let value = reader.value(ty, 0)?;
    let count = bytes.len() - reader.pos;
    if count > 0 {
        return Err(CodecError::TrailingBytes { count });
    }
    Ok(value)
}

/// Decode the payload of a failed reply as text.
///
/// Tries an encoded string first and falls back to lossy UTF-8.
#[must_use]
pub fn decode_error_message(payload: &[u8]) -> String {
    let mut reader = Reader::new(&EMPTY, payload);
    match reader.string() {
        Ok(text) if reader.pos == payload.len() => text,
        _ => String::from_utf8_lossy(payload).into_owned(),
    }
}

static EMPTY: ProgramMetadata = ProgramMetadata {
    version: super::metadata::METADATA_VERSION,
    types: Vec::new(),
    entry: super::metadata::EntryPoints {
        handle_input: None,
        handle_output: None,
        state_query: None,
        state_output: None,
    },
};

/// Encoder and decoder bound to one program's metadata.
#[derive(Debug, Clone)]
pub struct Codec {
    metadata: Arc<ProgramMetadata>,
}

impl Codec {
    /// Create a codec over loaded metadata.
    #[must_use]
    pub fn new(metadata: Arc<ProgramMetadata>) -> Self {
        Self { metadata }
    }

    /// The metadata this codec uses.
    #[must_use]
    pub fn metadata(&self) -> &ProgramMetadata {
        &self.metadata
    }

    pub fn encode(&self, ty: TypeRef, value: &Value) -> Result<Vec<u8>, CodecError> {
        encode(&self.metadata, ty, value)
    }

    pub fn decode(&self, ty: TypeRef, bytes: &[u8]) -> Result<Value, CodecError> {
        decode(&self.metadata, ty, bytes)
    }

    /// Encode an action payload with the program's input type.
    pub fn encode_action(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let ty = self
            .metadata
            .entry
            .handle_input
            .ok_or(CodecError::MissingEntryPoint("handle_input"))?;
        self.encode(ty, value)
    }

    /// Decode a reply payload with the program's output type.
    pub fn decode_reply(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let ty = self
            .metadata
            .entry
            .handle_output
            .ok_or(CodecError::MissingEntryPoint("handle_output"))?;
        self.decode(ty, bytes)
    }

    /// Encode a state query with the program's query type.
    pub fn encode_state_query(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let ty = self
            .metadata
            .entry
            .state_query
            .ok_or(CodecError::MissingEntryPoint("state_query"))?;
        self.encode(ty, value)
    }

    /// Decode a state read with the program's state type.
    pub fn decode_state(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let ty = self
            .metadata
            .entry
            .state_output
            .ok_or(CodecError::MissingEntryPoint("state_output"))?;
        self.decode(ty, bytes)
    }
}

// =============================================================================
// Compact length prefix
// =============================================================================

fn write_compact(out: &mut Vec<u8>, n: u64) {
    if n < 1 << 6 {
        out.push((n as u8) << 2);
    } else if n < 1 << 14 {
        out.extend_from_slice(&(((n as u16) << 2) | 0b01).to_le_bytes());
    } else if n < 1 << 30 {
        out.extend_from_slice(&(((n as u32) << 2) | 0b10).to_le_bytes());
    } else {
        let bytes = n.to_le_bytes();
        let used = 8 - (n.leading_zeros() as usize / 8);
        out.push((((used - 4) as u8) << 2) | 0b11);
        out.extend_from_slice(&bytes[..used]);
    }
}

// =============================================================================
// Encoder
// =============================================================================

struct Encoder<'a> {
    metadata: &'a ProgramMetadata,
    out: &'a mut Vec<u8>,
}

fn mismatch(expected: &Shape, found: &Value) -> CodecError {
    CodecError::Mismatch {
        expected: expected.label(),
        found: found.kind(),
    }
}

fn unsigned(shape: &Shape, value: &Value, max: u128) -> Result<u128, CodecError> {
    match value {
        Value::Unsigned(n) if *n <= max => Ok(*n),
        Value::Unsigned(n) => Err(CodecError::OutOfRange {
            ty: shape.label(),
            value: n.to_string(),
        }),
        other => Err(mismatch(shape, other)),
    }
}

fn signed(shape: &Shape, value: &Value, min: i128, max: i128) -> Result<i128, CodecError> {
    match value {
        Value::Signed(n) if (min..=max).contains(n) => Ok(*n),
        Value::Signed(n) => Err(CodecError::OutOfRange {
            ty: shape.label(),
            value: n.to_string(),
        }),
        other => Err(mismatch(shape, other)),
    }
}

impl Encoder<'_> {
    fn value(&mut self, ty: TypeRef, value: &Value, depth: usize) -> Result<(), CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::DepthExceeded(MAX_DEPTH));
        }
        let metadata = self.metadata;
        let shape = metadata.shape(ty)?;
        match shape {
            Shape::Bool => match value {
                Value::Bool(b) => self.out.push(u8::from(*b)),
                other => return Err(mismatch(shape, other)),
            },
            Shape::U8 => self.out.push(unsigned(shape, value, u8::MAX.into())? as u8),
            Shape::U16 => self
                .out
                .extend_from_slice(&(unsigned(shape, value, u16::MAX.into())? as u16).to_le_bytes()),
            Shape::U32 => self
                .out
                .extend_from_slice(&(unsigned(shape, value, u32::MAX.into())? as u32).to_le_bytes()),
            Shape::U64 => self
                .out
                .extend_from_slice(&(unsigned(shape, value, u64::MAX.into())? as u64).to_le_bytes()),
            Shape::U128 => self
                .out
                .extend_from_slice(&unsigned(shape, value, u128::MAX)?.to_le_bytes()),
            Shape::I8 => self.out.extend_from_slice(
                &(signed(shape, value, i8::MIN.into(), i8::MAX.into())? as i8).to_le_bytes(),
            ),
            Shape::I16 => self.out.extend_from_slice(
                &(signed(shape, value, i16::MIN.into(), i16::MAX.into())? as i16).to_le_bytes(),
            ),
            Shape::I32 => self.out.extend_from_slice(
                &(signed(shape, value, i32::MIN.into(), i32::MAX.into())? as i32).to_le_bytes(),
            ),
            Shape::I64 => self.out.extend_from_slice(
                &(signed(shape, value, i64::MIN.into(), i64::MAX.into())? as i64).to_le_bytes(),
            ),
            Shape::I128 => self
                .out
                .extend_from_slice(&signed(shape, value, i128::MIN, i128::MAX)?.to_le_bytes()),
            Shape::Str => match value {
                Value::Str(s) => {
                    write_compact(self.out, s.len() as u64);
                    self.out.extend_from_slice(s.as_bytes());
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Bytes => match value {
                Value::Bytes(b) => {
                    write_compact(self.out, b.len() as u64);
                    self.out.extend_from_slice(b);
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::ActorId => match value {
                Value::Actor(id) => self.out.extend_from_slice(id.as_bytes()),
                other => return Err(mismatch(shape, other)),
            },
            Shape::Sequence(element) => match value {
                Value::Sequence(items) => {
                    write_compact(self.out, items.len() as u64);
                    for item in items {
                        self.value(*element, item, depth + 1)?;
                    }
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Array { element, len } => match value {
                Value::Sequence(items) => {
                    if items.len() != *len as usize {
                        return Err(CodecError::Arity {
                            expected: *len as usize,
                            found: items.len(),
                        });
                    }
                    for item in items {
                        self.value(*element, item, depth + 1)?;
                    }
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Tuple(types) => match value {
                Value::Tuple(items) => {
                    if items.len() != types.len() {
                        return Err(CodecError::Arity {
                            expected: types.len(),
                            found: items.len(),
                        });
                    }
                    for (ty, item) in types.iter().zip(items) {
                        self.value(*ty, item, depth + 1)?;
                    }
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Composite(fields) => match value {
                Value::Composite(values) => self.fields(fields, values, depth)?,
                other => return Err(mismatch(shape, other)),
            },
            Shape::Variant(variants) => match value {
                Value::Variant { name, fields } => {
                    let def = variants
                        .iter()
                        .find(|v| v.name == *name)
                        .ok_or_else(|| CodecError::UnknownVariantName(name.clone()))?;
                    self.out.push(def.index);
                    self.fields(&def.fields, fields, depth)?;
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Option(inner) => match value {
                Value::Option(None) => self.out.push(0),
                Value::Option(Some(v)) => {
                    self.out.push(1);
                    self.value(*inner, v, depth + 1)?;
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Result { ok, err } => match value {
                Value::Result(Ok(v)) => {
                    self.out.push(0);
                    self.value(*ok, v, depth + 1)?;
                }
                Value::Result(Err(v)) => {
                    self.out.push(1);
                    self.value(*err, v, depth + 1)?;
                }
                other => return Err(mismatch(shape, other)),
            },
            Shape::Opaque(name) => {
                return Err(CodecError::UnsupportedShape {
                    ty,
                    reason: format!("opaque type `{name}`"),
                })
            }
        }
        Ok(())
    }

    fn fields(
        &mut self,
        shape: &[Field],
        values: &[(String, Value)],
        depth: usize,
    ) -> Result<(), CodecError> {
        if shape.len() != values.len() {
            return Err(CodecError::Arity {
                expected: shape.len(),
                found: values.len(),
            });
        }
        for (field, (name, value)) in shape.iter().zip(values) {
            if field.name != *name {
                return Err(CodecError::FieldName {
                    expected: field.name.clone(),
                    found: name.clone(),
                });
            }
            self.value(field.ty, value, depth + 1)?;
        }
        Ok(())
    }
}

// =============================================================================
// Decoder
// =============================================================================

struct Reader<'a> {
    metadata: &'a ProgramMetadata,
    bytes: &'a [u8],
    pos: usize,
    /// Types being decoded on the current path, with their start offsets.
    path: Vec<(TypeRef, usize)>,
}

impl<'a> Reader<'a> {
    fn new(metadata: &'a ProgramMetadata, bytes: &'a [u8]) -> Self {
        Self {
            metadata,
            bytes,
            pos: 0,
            path: Vec::new(),
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn compact(&mut self) -> Result<u64, CodecError> {
        let first = self.byte()?;
        match first & 0b11 {
            0b00 => Ok(u64::from(first >> 2)),
            0b01 => {
                let rest = self.byte()?;
                Ok(u64::from(u16::from_le_bytes([first, rest]) >> 2))
            }
            0b10 => {
                let rest = self.take(3)?;
                Ok(u64::from(
                    u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2,
                ))
            }
            _ => {
                let used = usize::from(first >> 2) + 4;
                if used > 8 {
                    return Err(CodecError::LengthOverflow { len: u64::MAX });
                }
                let mut buf = [0u8; 8];
                buf[..used].copy_from_slice(self.take(used)?);
                Ok(u64::from_le_bytes(buf))
            }
        }
    }

    /// A length prefix that must fit in the remaining input given that each
    /// element needs at least `min_size` bytes.
    fn length(&mut self, min_size: usize) -> Result<usize, CodecError> {
        let len = self.compact()?;
        let limit = match min_size {
            0 => MAX_ZERO_SIZED_LEN,
            size => self.remaining() / size,
        };
        usize::try_from(len)
            .ok()
            .filter(|n| *n <= limit)
            .ok_or(CodecError::LengthOverflow { len })
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = self.length(1)?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn value(&mut self, ty: TypeRef, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::DepthExceeded(MAX_DEPTH));
        }
        let frame = (ty, self.pos);
        if self.path.contains(&frame) {
            return Err(CodecError::UnsupportedShape {
                ty,
                reason: "type contains itself without consuming input".into(),
            });
        }
        self.path.push(frame);
        let value = self.shape_value(ty, depth);
        self.path.pop();
        value
    }

    fn shape_value(&mut self, ty: TypeRef, depth: usize) -> Result<Value, CodecError> {
        let metadata = self.metadata;
        let shape = metadata.shape(ty)?;
        let value = match shape {
            Shape::Bool => match self.byte()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                tag => return Err(CodecError::InvalidTag { kind: "bool", tag }),
            },
            Shape::U8 => Value::Unsigned(self.byte()?.into()),
            Shape::U16 => Value::Unsigned(u16::from_le_bytes(self.array()?).into()),
            Shape::U32 => Value::Unsigned(u32::from_le_bytes(self.array()?).into()),
            Shape::U64 => Value::Unsigned(u64::from_le_bytes(self.array()?).into()),
            Shape::U128 => Value::Unsigned(u128::from_le_bytes(self.array()?)),
            Shape::I8 => Value::Signed(i8::from_le_bytes(self.array()?).into()),
            Shape::I16 => Value::Signed(i16::from_le_bytes(self.array()?).into()),
            Shape::I32 => Value::Signed(i32::from_le_bytes(self.array()?).into()),
            Shape::I64 => Value::Signed(i64::from_le_bytes(self.array()?).into()),
            Shape::I128 => Value::Signed(i128::from_le_bytes(self.array()?)),
            Shape::Str => Value::Str(self.string()?),
            Shape::Bytes => {
                let len = self.length(1)?;
                Value::Bytes(self.take(len)?.to_vec())
            }
            Shape::ActorId => Value::Actor(ActorId::new(self.array()?)),
            Shape::Sequence(element) => {
                let len = self.length(min_encoded_size(metadata, *element))?;
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.value(*element, depth + 1)?);
                }
                Value::Sequence(items)
            }
            Shape::Array { element, len } => {
                let mut items = Vec::with_capacity((*len as usize).min(self.remaining()));
                for _ in 0..*len {
                    items.push(self.value(*element, depth + 1)?);
                }
                Value::Sequence(items)
            }
            Shape::Tuple(types) => {
                let mut items = Vec::with_capacity(types.len());
                for ty in types {
                    items.push(self.value(*ty, depth + 1)?);
                }
                Value::Tuple(items)
            }
            Shape::Composite(fields) => Value::Composite(self.fields(fields, depth)?),
            Shape::Variant(variants) => {
                let index = self.byte()?;
                let def = variants
                    .iter()
                    .find(|v| v.index == index)
                    .ok_or(CodecError::UnknownVariantIndex(index))?;
                Value::Variant {
                    name: def.name.clone(),
                    fields: self.fields(&def.fields, depth)?,
                }
            }
            Shape::Option(inner) => match self.byte()? {
                0 => Value::Option(None),
                1 => Value::Option(Some(Box::new(self.value(*inner, depth + 1)?))),
                tag => return Err(CodecError::InvalidTag { kind: "option", tag }),
            },
            Shape::Result { ok, err } => match self.byte()? {
                0 => Value::Result(Ok(Box::new(self.value(*ok, depth + 1)?))),
                1 => Value::Result(Err(Box::new(self.value(*err, depth + 1)?))),
                tag => return Err(CodecError::InvalidTag { kind: "result", tag }),
            },
            Shape::Opaque(name) => {
                return Err(CodecError::UnsupportedShape {
                    ty,
                    reason: format!("opaque type `{name}`"),
                })
            }
        };
        Ok(value)
    }

    fn fields(&mut self, fields: &[Field], depth: usize) -> Result<Vec<(String, Value)>, CodecError> {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            out.push((field.name.clone(), self.value(field.ty, depth + 1)?));
        }
        Ok(out)
    }
}

/// Lower bound on the encoded size of `ty`, used to bound length prefixes.
///
/// Each type is sized once; a type reached again while it is being sized
/// counts as zero.
fn min_encoded_size(metadata: &ProgramMetadata, ty: TypeRef) -> usize {
    let mut memo = vec![None; metadata.types.len()];
    min_size(metadata, ty, &mut memo)
}

fn min_size(metadata: &ProgramMetadata, ty: TypeRef, memo: &mut [Option<usize>]) -> usize {
    let Some(slot) = memo.get(ty as usize).copied() else {
        return 0;
    };
    if let Some(size) = slot {
        return size;
    }
    memo[ty as usize] = Some(0);

    let Ok(shape) = metadata.shape(ty) else {
        return 0;
    };
    let size = match shape {
        Shape::Bool | Shape::U8 | Shape::I8 => 1,
        Shape::U16 | Shape::I16 => 2,
        Shape::U32 | Shape::I32 => 4,
        Shape::U64 | Shape::I64 => 8,
        Shape::U128 | Shape::I128 => 16,
        Shape::ActorId => 32,
        Shape::Str | Shape::Bytes | Shape::Sequence(_) => 1,
        Shape::Variant(_) | Shape::Option(_) | Shape::Result { .. } => 1,
        Shape::Array { len: 0, .. } => 0,
        Shape::Array { element, len } => {
            (*len as usize).saturating_mul(min_size(metadata, *element, memo))
        }
        Shape::Tuple(types) => types
            .iter()
            .map(|t| min_size(metadata, *t, memo))
            .fold(0, usize::saturating_add),
        Shape::Composite(fields) => fields
            .iter()
            .map(|f| min_size(metadata, f.ty, memo))
            .fold(0, usize::saturating_add),
        Shape::Opaque(_) => 0,
    };
    memo[ty as usize] = Some(size);
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::EntryPoints;
    use crate::domain::shape::VariantDef;

    fn metadata() -> ProgramMetadata {
        ProgramMetadata::new(
            vec![
                /* 0 */ Shape::U32,
                /* 1 */ Shape::Str,
                /* 2 */ Shape::Sequence(0),
                /* 3 */
                Shape::Variant(vec![
                    VariantDef::unit("Registered", 0),
                    VariantDef::with_fields("Moved", 4, vec![Field::named("steps", 0)]),
                ]),
                /* 4 */ Shape::Option(3),
                /* 5 */ Shape::Opaque("BTreeMap".into()),
                /* 6 */ Shape::Tuple(vec![]),
                /* 7 */ Shape::Sequence(6),
                /* 8 */ Shape::Bool,
                /* 9 */ Shape::U8,
            ],
            EntryPoints {
                handle_input: Some(3),
                handle_output: Some(4),
                ..EntryPoints::default()
            },
        )
    }

    #[test]
    fn test_integer_little_endian() {
        let meta = metadata();
        let bytes = encode(&meta, 0, &Value::Unsigned(0x0102_0304)).unwrap();
        assert_eq!(bytes, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_compact_modes() {
        for n in [0u64, 63, 64, 16_383, 16_384, (1 << 30) - 1, 1 << 30, u64::MAX] {
            let mut out = Vec::new();
            write_compact(&mut out, n);
            let mut reader = Reader::new(&EMPTY, &out);
            assert_eq!(reader.compact().unwrap(), n, "n = {n}");
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_variant_uses_declared_index() {
        let meta = metadata();
        let value = Value::variant_with("Moved", vec![("steps", Value::Unsigned(2))]);
        let bytes = encode(&meta, 3, &value).unwrap();
        assert_eq!(bytes[0], 4);
        assert_eq!(decode(&meta, 3, &bytes).unwrap(), value);
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let meta = metadata();
        assert!(matches!(
            encode(&meta, 3, &Value::variant("Teleported")),
            Err(CodecError::UnknownVariantName(_))
        ));
        assert!(matches!(
            decode(&meta, 3, &[9]),
            Err(CodecError::UnknownVariantIndex(9))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let meta = metadata();
        let err = decode(&meta, 0, &[1, 0, 0, 0, 7]).unwrap_err();
        assert_eq!(err, CodecError::TrailingBytes { count: 1 });
    }

    #[test]
    fn test_truncated_input_rejected() {
        let meta = metadata();
        assert!(matches!(
            decode(&meta, 0, &[1, 0]),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_length_prefix_bounded() {
        let meta = metadata();
        // Claims 1000 u32 elements with no data behind it.
        let mut bytes = Vec::new();
        write_compact(&mut bytes, 1000);
        assert!(matches!(
            decode(&meta, 2, &bytes),
            Err(CodecError::LengthOverflow { len: 1000 })
        ));
    }

    #[test]
    fn test_zero_sized_sequence_roundtrip() {
        let meta = metadata();
        let value = Value::Sequence(vec![Value::unit(); 3]);
        let bytes = encode(&meta, 7, &value).unwrap();
        assert_eq!(decode(&meta, 7, &bytes).unwrap(), value);
    }

    #[test]
    fn test_self_containing_type_fails_fast() {
        // Built without validation, as a codec may be.
        let meta = ProgramMetadata::new(
            vec![Shape::Tuple(vec![0, 0]), Shape::Sequence(0)],
            EntryPoints::default(),
        );
        assert!(matches!(
            decode(&meta, 1, &[4]),
            Err(CodecError::UnsupportedShape { ty: 0, .. })
        ));
    }

    #[test]
    fn test_wide_recursive_type_is_sized_once() {
        let meta = ProgramMetadata::new(
            vec![
                /* 0 */ Shape::Tuple(vec![1, 1]),
                /* 1 */ Shape::Array { element: 0, len: 0 },
                /* 2 */ Shape::Sequence(0),
            ],
            EntryPoints::default(),
        );
        assert_eq!(min_encoded_size(&meta, 0), 0);

        let value = decode(&meta, 2, &[4]).unwrap();
        let empty = Value::Sequence(vec![]);
        assert_eq!(
            value,
            Value::Sequence(vec![Value::Tuple(vec![empty.clone(), empty])])
        );
    }

    #[test]
    fn test_opaque_is_unsupported() {
        let meta = metadata();
        assert!(matches!(
            encode(&meta, 5, &Value::unit()),
            Err(CodecError::UnsupportedShape { ty: 5, .. })
        ));
        assert!(matches!(
            decode(&meta, 5, &[]),
            Err(CodecError::UnsupportedShape { ty: 5, .. })
        ));
        assert!(matches!(
            decode(&meta, 99, &[]),
            Err(CodecError::UnsupportedShape { ty: 99, .. })
        ));
    }

    #[test]
    fn test_no_silent_coercion() {
        let meta = metadata();
        assert!(matches!(
            encode(&meta, 0, &Value::Str("1".into())),
            Err(CodecError::Mismatch { .. })
        ));
        assert!(matches!(
            encode(&meta, 9, &Value::Unsigned(256)),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            decode(&meta, 8, &[2]),
            Err(CodecError::InvalidTag { kind: "bool", tag: 2 })
        ));
    }

    #[test]
    fn test_codec_entry_points() {
        let codec = Codec::new(Arc::new(metadata()));
        let bytes = codec.encode_action(&Value::variant("Registered")).unwrap();
        assert_eq!(bytes, vec![0]);

        let reply = codec.decode_reply(&[1, 0]).unwrap();
        assert_eq!(reply.variant_name(), Some("Registered"));

        assert!(matches!(
            codec.decode_state(&[]),
            Err(CodecError::MissingEntryPoint("state_output"))
        ));
    }

    #[test]
    fn test_error_message_decoding() {
        let meta = metadata();
        let encoded = encode(&meta, 1, &Value::Str("Not your turn".into())).unwrap();
        assert_eq!(decode_error_message(&encoded), "Not your turn");
        assert_eq!(decode_error_message(b"plain panic text"), "plain panic text");
    }
}

#[cfg(test)]
mod props {
    use super::*;
    use crate::domain::metadata::EntryPoints;
    use crate::domain::shape::VariantDef;
    use proptest::prelude::*;

    /// A shape together with one value it can represent.
    #[derive(Debug, Clone)]
    enum Sample {
        Leaf(Shape, Value),
        SeqU32(Vec<u32>),
        Tuple(Vec<Sample>),
        Composite(Vec<Sample>),
        Option(Box<Sample>, bool),
        Result(Box<Sample>, Box<Sample>, bool),
        Signal(u8, u32),
    }

    fn integer_strategy() -> impl Strategy<Value = Sample> {
        prop_oneof![
            any::<u8>().prop_map(|n| Sample::Leaf(Shape::U8, Value::Unsigned(n.into()))),
            any::<u16>().prop_map(|n| Sample::Leaf(Shape::U16, Value::Unsigned(n.into()))),
            any::<u32>().prop_map(|n| Sample::Leaf(Shape::U32, Value::Unsigned(n.into()))),
            any::<u64>().prop_map(|n| Sample::Leaf(Shape::U64, Value::Unsigned(n.into()))),
            any::<u128>().prop_map(|n| Sample::Leaf(Shape::U128, Value::Unsigned(n))),
            any::<i8>().prop_map(|n| Sample::Leaf(Shape::I8, Value::Signed(n.into()))),
            any::<i32>().prop_map(|n| Sample::Leaf(Shape::I32, Value::Signed(n.into()))),
            any::<i64>().prop_map(|n| Sample::Leaf(Shape::I64, Value::Signed(n.into()))),
            any::<i128>().prop_map(|n| Sample::Leaf(Shape::I128, Value::Signed(n))),
        ]
    }

    fn leaf_strategy() -> impl Strategy<Value = Sample> {
        prop_oneof![
            integer_strategy(),
            any::<bool>().prop_map(|b| Sample::Leaf(Shape::Bool, Value::Bool(b))),
            ".{0,80}".prop_map(|s| Sample::Leaf(Shape::Str, Value::Str(s))),
            prop::collection::vec(any::<u8>(), 0..300)
                .prop_map(|b| Sample::Leaf(Shape::Bytes, Value::Bytes(b))),
            any::<[u8; 32]>()
                .prop_map(|b| Sample::Leaf(Shape::ActorId, Value::Actor(ActorId::new(b)))),
            prop::collection::vec(any::<u32>(), 0..8).prop_map(Sample::SeqU32),
            (0u8..3, any::<u32>()).prop_map(|(i, n)| Sample::Signal(i, n)),
        ]
    }

    fn sample_strategy() -> impl Strategy<Value = Sample> {
        leaf_strategy().prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Sample::Tuple),
                prop::collection::vec(inner.clone(), 0..4).prop_map(Sample::Composite),
                (inner.clone(), any::<bool>()).prop_map(|(s, some)| Sample::Option(Box::new(s), some)),
                (inner.clone(), inner, any::<bool>())
                    .prop_map(|(ok, err, is_ok)| Sample::Result(Box::new(ok), Box::new(err), is_ok)),
            ]
        })
    }

    fn push(types: &mut Vec<Shape>, shape: Shape) -> TypeRef {
        types.push(shape);
        (types.len() - 1) as TypeRef
    }

    /// Register the sample's shape and return its type and value.
    fn build(sample: &Sample, types: &mut Vec<Shape>) -> (TypeRef, Value) {
        match sample {
            Sample::Leaf(shape, value) => (push(types, shape.clone()), value.clone()),
            Sample::SeqU32(items) => {
                let element = push(types, Shape::U32);
                let ty = push(types, Shape::Sequence(element));
                let values = items.iter().map(|n| Value::Unsigned((*n).into())).collect();
                (ty, Value::Sequence(values))
            }
            Sample::Tuple(items) => {
                let (refs, values): (Vec<_>, Vec<_>) = items.iter().map(|s| build(s, types)).unzip();
                (push(types, Shape::Tuple(refs)), Value::Tuple(values))
            }
            Sample::Composite(items) => {
                let mut fields = Vec::new();
                let mut values = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let (ty, value) = build(item, types);
                    let name = format!("f{i}");
                    fields.push(Field::named(name.clone(), ty));
                    values.push((name, value));
                }
                (push(types, Shape::Composite(fields)), Value::Composite(values))
            }
            Sample::Option(inner, some) => {
                let (ty, value) = build(inner, types);
                let wrapped = some.then(|| Box::new(value));
                (push(types, Shape::Option(ty)), Value::Option(wrapped))
            }
            Sample::Result(ok, err, is_ok) => {
                let (ok_ty, ok_value) = build(ok, types);
                let (err_ty, err_value) = build(err, types);
                let value = if *is_ok {
                    Value::Result(Ok(Box::new(ok_value)))
                } else {
                    Value::Result(Err(Box::new(err_value)))
                };
                (push(types, Shape::Result { ok: ok_ty, err: err_ty }), value)
            }
            Sample::Signal(index, n) => {
                let number = push(types, Shape::U32);
                let ty = push(
                    types,
                    Shape::Variant(vec![
                        VariantDef::unit("Idle", 3),
                        VariantDef::with_fields("Damage", 7, vec![Field::named("amount", number)]),
                        VariantDef::with_fields("Pair", 9, vec![Field::named("", number), Field::named("", number)]),
                    ]),
                );
                let value = match index {
                    0 => Value::variant("Idle"),
                    1 => Value::variant_with("Damage", vec![("amount", Value::Unsigned((*n).into()))]),
                    _ => Value::variant_with(
                        "Pair",
                        vec![("", Value::Unsigned((*n).into())), ("", Value::Unsigned(0))],
                    ),
                };
                (ty, value)
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn roundtrip_every_shape(sample in sample_strategy()) {
            let mut types = Vec::new();
            let (ty, value) = build(&sample, &mut types);
            let metadata = ProgramMetadata::new(types, EntryPoints::default());
            prop_assert!(metadata.validate().is_ok());

            let bytes = encode(&metadata, ty, &value).unwrap_or_else(|e| panic!("encode failed: {e}"));
            let decoded = decode(&metadata, ty, &bytes).unwrap_or_else(|e| panic!("decode failed: {e}"));
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn decode_never_panics_on_noise(noise in prop::collection::vec(any::<u8>(), 0..64), sample in sample_strategy()) {
            let mut types = Vec::new();
            let (ty, _) = build(&sample, &mut types);
            let metadata = ProgramMetadata::new(types, EntryPoints::default());
            let _ = decode(&metadata, ty, &noise);
        }
    }
}
