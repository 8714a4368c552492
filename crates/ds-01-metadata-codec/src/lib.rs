//! # DS-01 Metadata Codec
//!
//! Loads a program's type-descriptor blob and encodes/decodes payloads with
//! it.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `ProgramMetadata`: type table and entry points, parsed from a blob
//!   - `Shape` / `Value`: type descriptors and dynamic values
//!   - `Codec`: `encode` / `decode` bound to one program's metadata
//!   - `VariantDecoder`: classifies replies into a closed variant set
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `MetadataSource`: Driven port delivering the raw blob
//!
//! - **Adapters Layer** (`adapters/`): Blob sources
//!   - `FileMetadataSource`: reads `meta.txt`-style files
//!   - `StaticMetadataSource`: in-memory blobs
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `MetadataLoader`: fetch, parse, validate and cache
//!
//! ## Invariants
//!
//! - **Round trip**: `decode(ty, encode(ty, v)) == v` for every `v` that `ty`
//!   can represent
//! - **No coercion**: unknown or opaque shapes fail with
//!   `CodecError::UnsupportedShape`; mismatched values are never coerced
//!
//! ## Usage Example
//!
//! ```ignore
//! use ds_01_metadata_codec::{FileMetadataSource, MetadataLoader, Value};
//!
//! let loader = MetadataLoader::new(Arc::new(FileMetadataSource::new("meta.txt")));
//! let codec = loader.codec().await?;
//! let payload = codec.encode_action(&Value::variant("Register"))?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::{FileMetadataSource, StaticMetadataSource};
pub use domain::{
    decode, decode_error_message, encode, Codec, EntryPoints, Field, PayloadDecoder,
    ProgramMetadata, ProgramReply, Shape, TypeRef, Value, VariantDecoder, VariantDef,
    METADATA_VERSION,
};
pub use error::{CodecError, MetadataError};
pub use ports::MetadataSource;
pub use service::{load, MetadataLoader};
