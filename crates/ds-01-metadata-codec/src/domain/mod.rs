//! Domain layer: type descriptors, values and the codec. No I/O.

pub mod classify;
pub mod codec;
pub mod metadata;
pub mod shape;
pub mod value;

pub use classify::{PayloadDecoder, ProgramReply, VariantDecoder};
pub use codec::{decode, decode_error_message, encode, Codec, MAX_DEPTH};
pub use metadata::{EntryPoints, ProgramMetadata, METADATA_VERSION};
pub use shape::{Field, Shape, TypeRef, VariantDef};
pub use value::Value;
