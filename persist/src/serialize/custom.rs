//! Per-type custom serializers.
//!
//! A [`CustomSerializerTable`] maps a type name to a pair of callbacks that
//! replace the default record encoding for that type. Lookup walks the
//! runtime type's declared ancestors, so a serializer registered for a base
//! type also handles its derived types.
//!
//! Callbacks read and write through [`WriteAdapter`] / [`ReadAdapter`],
//! which scope every key under the value's own key prefix and expose the
//! [`ReferenceRegistry`] for identity lookups.

use std::collections::HashMap;

use super::codec::ValueCodec;
use super::error::PersistError;
use super::flat::{key_path, FlatMap, FlatReader};
use super::value::{FieldType, Persist, TypeDescriptor, Value};
use crate::member::Record;
use crate::registry::ReferenceRegistry;

/// Key segment written by the built-in entity serializer.
pub const ENTITY_IDENTITY_KEY: &str = "Identity";
/// Table name of the built-in entity serializer.
pub const ENTITY_TYPE_NAME: &str = "Entity";

/// A type-erased serialize callback.
pub type SerializeFn =
    Box<dyn Fn(&Value, &mut WriteAdapter<'_, '_>) -> Result<(), PersistError> + Send + Sync>;

/// A type-erased deserialize callback. Receives the value's default and
/// returns the decoded value.
pub type DeserializeFn = Box<
    dyn Fn(&mut ReadAdapter<'_, '_, '_>, Value) -> Result<Value, PersistError> + Send + Sync,
>;

/// One registered serialize/deserialize pair.
pub struct CustomSerializer {
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl CustomSerializer {
    pub(crate) fn serialize(
        &self,
        value: &Value,
        adapter: &mut WriteAdapter<'_, '_>,
    ) -> Result<(), PersistError> {
        (self.serialize)(value, adapter)
    }

    pub(crate) fn deserialize(
        &self,
        adapter: &mut ReadAdapter<'_, '_, '_>,
        default: Value,
    ) -> Result<Value, PersistError> {
        (self.deserialize)(adapter, default)
    }
}

/// Type name → custom serializer pair.
pub struct CustomSerializerTable {
    entries: HashMap<String, CustomSerializer>,
}

impl Default for CustomSerializerTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CustomSerializerTable {
    /// An empty table. Entity handle fields are then written as null.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A table holding the built-in entity handle serializer, which persists
    /// an [`Entity`](crate::Entity) as `<key>.Identity`.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register(ENTITY_TYPE_NAME, serialize_entity, deserialize_entity);
        table
    }

    /// Registers a serializer pair for `type_name`, replacing any previous one.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        serialize: impl Fn(&Value, &mut WriteAdapter<'_, '_>) -> Result<(), PersistError>
            + Send
            + Sync
            + 'static,
        deserialize: impl Fn(&mut ReadAdapter<'_, '_, '_>, Value) -> Result<Value, PersistError>
            + Send
            + Sync
            + 'static,
    ) {
        let type_name = type_name.into();
        if self.entries.contains_key(&type_name) {
            log::debug!("replacing custom serializer for '{type_name}'");
        }
        self.entries.insert(
            type_name,
            CustomSerializer {
                serialize: Box::new(serialize),
                deserialize: Box::new(deserialize),
            },
        );
    }

    /// Registers typed callbacks for record type `T`.
    ///
    /// On load the callback receives the field's current value converted to
    /// `T`. Fields of a derived type that `T` does not declare keep their
    /// defaults.
    pub fn register_record<T, S, D>(&mut self, serialize: S, deserialize: D)
    where
        T: Record,
        S: Fn(&T, &mut WriteAdapter<'_, '_>) -> Result<(), PersistError> + Send + Sync + 'static,
        D: Fn(&mut ReadAdapter<'_, '_, '_>, T) -> Result<T, PersistError> + Send + Sync + 'static,
    {
        self.register(
            T::NAME,
            move |value, adapter| match value {
                Value::Record(record) => {
                    let typed = T::from_record_value(record.clone());
                    serialize(&typed, adapter)
                }
                other => Err(PersistError::custom(
                    T::NAME,
                    format!("expected a record, got {}", other.kind()),
                )),
            },
            move |adapter, default| {
                let (typed, base) = match default {
                    Value::Record(record) => (T::from_record_value(record.clone()), Some(record)),
                    _ => (T::default(), None),
                };
                let produced = deserialize(adapter, typed)?;
                let record = match base {
                    Some(mut record) => {
                        for field in produced.persisted_fields() {
                            record.set(field.name, field.value);
                        }
                        record
                    }
                    None => produced.to_record_value(),
                };
                Ok(Value::Record(record))
            },
        );
    }

    /// Finds the serializer for `descriptor` or its nearest declared ancestor.
    pub fn find(&self, descriptor: &'static TypeDescriptor) -> Option<&CustomSerializer> {
        descriptor
            .ancestry()
            .find_map(|desc| self.entries.get(desc.name))
    }

    /// Exact-name lookup without ancestor fallback.
    pub fn find_by_name(&self, type_name: &str) -> Option<&CustomSerializer> {
        self.entries.get(type_name)
    }

    pub(crate) fn find_for(&self, ty: &FieldType) -> Option<&CustomSerializer> {
        match ty {
            FieldType::Record(descriptor) => self.find(descriptor),
            FieldType::Entity => self.find_by_name(ENTITY_TYPE_NAME),
            _ => None,
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn serialize_entity(value: &Value, adapter: &mut WriteAdapter<'_, '_>) -> Result<(), PersistError> {
    let Value::Entity(entity) = value else {
        return Err(PersistError::custom(
            ENTITY_TYPE_NAME,
            format!("expected an entity, got {}", value.kind()),
        ));
    };
    match adapter.registry().identity_of(*entity) {
        Some(identity) => adapter.add(ENTITY_IDENTITY_KEY, &identity.to_owned()),
        None => {
            log::debug!("{entity} has no identity; written as null");
            adapter.add_value(ENTITY_IDENTITY_KEY, &FieldType::String, &Value::Null)
        }
    }
}

fn deserialize_entity(
    adapter: &mut ReadAdapter<'_, '_, '_>,
    default: Value,
) -> Result<Value, PersistError> {
    let identity = adapter.read_value(&FieldType::String, ENTITY_IDENTITY_KEY, Value::Null)?;
    let Value::String(identity) = identity else {
        return Ok(default);
    };
    Ok(match adapter.registry().resolve_object(&identity) {
        Some(entity) => Value::Entity(entity),
        None => {
            log::debug!("entity '{identity}' is not loaded");
            default
        }
    })
}

/// Write side handed to custom serializers. Keys are relative to the value's
/// own key.
pub struct WriteAdapter<'a, 'm> {
    codec: ValueCodec<'a>,
    out: &'m mut FlatMap,
    prefix: String,
}

impl<'a, 'm> WriteAdapter<'a, 'm> {
    pub(crate) fn new(codec: ValueCodec<'a>, out: &'m mut FlatMap, prefix: &str) -> Self {
        Self {
            codec,
            out,
            prefix: prefix.to_owned(),
        }
    }

    /// Encodes `value`, declared as `ty`, under `<prefix>.<name>`.
    pub fn add_value(&mut self, name: &str, ty: &FieldType, value: &Value) -> Result<(), PersistError> {
        let key = key_path(&self.prefix, name);
        self.codec.encode(ty, value, &key, self.out)
    }

    /// Typed form of [`add_value`](Self::add_value).
    pub fn add<T: Persist>(&mut self, name: &str, value: &T) -> Result<(), PersistError> {
        self.add_value(name, &T::field_type(), &value.to_value())
    }

    pub fn registry(&self) -> &'a ReferenceRegistry {
        self.codec.registry()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Read side handed to custom deserializers and to
/// [`Member::on_missing_property`](crate::Member::on_missing_property).
/// Keys are relative to the adapter's prefix.
pub struct ReadAdapter<'a, 'r, 'm> {
    codec: ValueCodec<'a>,
    reader: &'r mut FlatReader<'m>,
    prefix: String,
}

impl<'a, 'r, 'm> ReadAdapter<'a, 'r, 'm> {
    pub(crate) fn new(codec: ValueCodec<'a>, reader: &'r mut FlatReader<'m>, prefix: &str) -> Self {
        Self {
            codec,
            reader,
            prefix: prefix.to_owned(),
        }
    }

    /// Decodes `<prefix>.<name>` as `ty`, falling back to `default`.
    pub fn read_value(
        &mut self,
        ty: &FieldType,
        name: &str,
        default: Value,
    ) -> Result<Value, PersistError> {
        let key = key_path(&self.prefix, name);
        self.codec.decode(ty, &key, self.reader, default)
    }

    /// Typed form of [`read_value`](Self::read_value). Values that do not
    /// convert to `T` yield `default`.
    pub fn read<T: Persist>(&mut self, name: &str, default: T) -> Result<T, PersistError> {
        let value = self.read_value(&T::field_type(), name, default.to_value())?;
        Ok(T::from_value(value).unwrap_or(default))
    }

    /// Returns `true` if `<prefix>.<name>` holds a scalar or an explicit null.
    pub fn contains(&self, name: &str) -> bool {
        self.reader.contains_key(&key_path(&self.prefix, name))
    }

    pub fn registry(&self) -> &'a ReferenceRegistry {
        self.codec.registry()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
