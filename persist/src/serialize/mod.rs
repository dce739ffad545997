//! Flattening codec, custom serializers and per-entity payloads.
//!
//! # Architecture
//!
//! - [`Persist`] converts Rust field types to and from [`Value`]
//! - [`ValueCodec`] flattens one value into a [`FlatMap`] under a key path
//! - [`CustomSerializerTable`] overrides the encoding of chosen types
//! - [`save_entity`] / [`load_entity`] walk every member of one entity
//! - [`FlatMap::to_payload`] turns the map into bytes in a [`Format`]

mod codec;
mod custom;
mod entity_codec;
mod error;
mod flat;
mod format;
mod value;

pub use codec::{ValueCodec, REFERENCE_ID_KEY, REFERENCE_INDEX_KEY};
pub use custom::{
    CustomSerializer, CustomSerializerTable, DeserializeFn, ReadAdapter, SerializeFn,
    WriteAdapter, ENTITY_IDENTITY_KEY, ENTITY_TYPE_NAME,
};
pub use entity_codec::{load_entity, save_entity};
pub use error::{ContainerError, PersistError};
pub use flat::{
    key_path, FlatMap, FlatReader, Scalar, COUNT_KEY, KEYS_KEY, LENGTH_KEY, VALUES_KEY,
};
pub use format::{decode, encode, Format};
pub use value::{Field, FieldType, MemberLink, Persist, RecordValue, TypeDescriptor, Value};
