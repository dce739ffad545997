//! Key-path flattening codec.
//!
//! [`ValueCodec`] turns one typed value into entries of a [`FlatMap`] under a
//! key prefix, and reads it back. Both directions dispatch on the declared
//! [`FieldType`] in the same fixed order:
//!
//! 1. explicit null
//! 2. member references (`<key>.Id`, `<key>.Index`)
//! 3. arrays (`<key>.<i>`, `<key>.Length`)
//! 4. scalars (bool, integers, floats, strings, enums)
//! 5. custom serializers (exact type, then declared ancestors)
//! 6. sequences (`<key>.<i>`, `<key>.Count`)
//! 7. maps (`<key>.Keys.<i>`, `<key>.Values.<i>`, `<key>.Count`)
//! 8. composite records (`<key>.<field>`)
//!
//! Decoding never fails on missing or mismatched data: the caller-supplied
//! default is returned instead. Errors come from custom deserializers and
//! from collection sentinels that claim more entries than the payload holds.
//! Collection elements always start from a fresh zero value.

use super::custom::{CustomSerializerTable, ReadAdapter, WriteAdapter};
use super::error::PersistError;
use super::flat::{
    key_path, FlatMap, FlatReader, Scalar, COUNT_KEY, KEYS_KEY, LENGTH_KEY, VALUES_KEY,
};
use super::value::{FieldType, Value};
use crate::registry::ReferenceRegistry;

/// Key suffix holding a reference's target identity.
pub const REFERENCE_ID_KEY: &str = "Id";
/// Key suffix holding a reference's member index.
pub const REFERENCE_INDEX_KEY: &str = "Index";

/// Flattening codec bound to a serializer table and a reference registry.
#[derive(Clone, Copy)]
pub struct ValueCodec<'a> {
    serializers: &'a CustomSerializerTable,
    registry: &'a ReferenceRegistry,
}

impl<'a> ValueCodec<'a> {
    pub fn new(serializers: &'a CustomSerializerTable, registry: &'a ReferenceRegistry) -> Self {
        Self {
            serializers,
            registry,
        }
    }

    pub fn registry(&self) -> &'a ReferenceRegistry {
        self.registry
    }

    pub fn serializers(&self) -> &'a CustomSerializerTable {
        self.serializers
    }

    /// Writes `value`, declared as `ty`, under `key`.
    pub fn encode(
        &self,
        ty: &FieldType,
        value: &Value,
        key: &str,
        out: &mut FlatMap,
    ) -> Result<(), PersistError> {
        if let Value::Null = value {
            out.insert_null(key);
            return Ok(());
        }

        let ty = ty.non_null();
        match (ty, value) {
            (FieldType::Reference(_), Value::Reference(link)) => {
                match self.registry.identity_of(link.entity) {
                    Some(identity) => {
                        out.insert(
                            key_path(key, REFERENCE_ID_KEY),
                            Scalar::String(identity.to_owned()),
                        );
                        out.insert(
                            key_path(key, REFERENCE_INDEX_KEY),
                            Scalar::Int(link.index as i64),
                        );
                    }
                    // Target was never registered or has been despawned.
                    None => out.insert_null(key),
                }
                return Ok(());
            }
            (FieldType::Array(elem), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.encode(elem, item, &key_path(key, i), out)?;
                }
                out.insert(key_path(key, LENGTH_KEY), Scalar::Int(items.len() as i64));
                return Ok(());
            }
            (FieldType::Bool, Value::Bool(v)) => {
                out.insert(key, Scalar::Bool(*v));
                return Ok(());
            }
            (FieldType::Int | FieldType::Enum(_), Value::Int(v)) => {
                out.insert(key, Scalar::Int(*v));
                return Ok(());
            }
            (FieldType::Float, Value::Float(v)) => {
                out.insert(key, Scalar::Float(*v));
                return Ok(());
            }
            (FieldType::String, Value::String(v)) => {
                out.insert(key, Scalar::String(v.clone()));
                return Ok(());
            }
            _ => {}
        }

        // Runtime type for records, declared type otherwise.
        let custom = match value {
            Value::Record(record) => self.serializers.find(record.descriptor),
            _ => self.serializers.find_for(ty),
        };
        if let Some(serializer) = custom {
            let mut adapter = WriteAdapter::new(*self, out, key);
            return serializer.serialize(value, &mut adapter);
        }

        match (ty, value) {
            (FieldType::List(elem), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.encode(elem, item, &key_path(key, i), out)?;
                }
                out.insert(key_path(key, COUNT_KEY), Scalar::Int(items.len() as i64));
                Ok(())
            }
            (FieldType::Map(key_ty, value_ty), Value::Map(entries)) => {
                let keys_prefix = key_path(key, KEYS_KEY);
                let values_prefix = key_path(key, VALUES_KEY);
                for (i, (k, v)) in entries.iter().enumerate() {
                    self.encode(key_ty, k, &key_path(&keys_prefix, i), out)?;
                    self.encode(value_ty, v, &key_path(&values_prefix, i), out)?;
                }
                out.insert(key_path(key, COUNT_KEY), Scalar::Int(entries.len() as i64));
                Ok(())
            }
            (FieldType::Record(_), Value::Record(record)) => {
                for field in &record.fields {
                    self.encode(&field.ty, &field.value, &key_path(key, field.name), out)?;
                }
                Ok(())
            }
            (FieldType::Entity, Value::Entity(entity)) => {
                log::warn!("no serializer registered for entity handles; '{key}' ({entity}) written as null");
                out.insert_null(key);
                Ok(())
            }
            (ty, value) => Err(PersistError::FieldError {
                field: key.to_owned(),
                message: format!("{} value does not match declared type {ty:?}", value.kind()),
            }),
        }
    }

    /// Reads a value declared as `ty` from under `key`.
    ///
    /// `default` is returned when the data is absent or does not fit; for
    /// records it also supplies the per-field defaults.
    pub fn decode(
        &self,
        ty: &FieldType,
        key: &str,
        reader: &mut FlatReader<'_>,
        default: Value,
    ) -> Result<Value, PersistError> {
        if reader.take_null(key) {
            return Ok(ty.zero_value());
        }

        let ty = ty.non_null();
        match ty {
            FieldType::Reference(type_name) => {
                let Some(Scalar::String(identity)) = reader.get(&key_path(key, REFERENCE_ID_KEY))
                else {
                    return Ok(default);
                };
                let index = match reader.get(&key_path(key, REFERENCE_INDEX_KEY)) {
                    Some(Scalar::Int(i)) => u32::try_from(*i).ok(),
                    _ => Some(0),
                };
                let link =
                    index.and_then(|i| self.registry.resolve_component(identity, type_name, i));
                return Ok(match link {
                    Some(link) => Value::Reference(link),
                    None => {
                        log::debug!("'{key}' references absent {type_name} on '{identity}'");
                        default
                    }
                });
            }
            FieldType::Array(elem) => {
                let Some(len) = read_count(reader, key, LENGTH_KEY)? else {
                    return Ok(default);
                };
                let items = self.decode_items(elem, key, reader, len)?;
                return Ok(Value::Array(items));
            }
            FieldType::Bool => {
                return Ok(match reader.get(key) {
                    Some(Scalar::Bool(v)) => Value::Bool(*v),
                    _ => default,
                });
            }
            FieldType::Int | FieldType::Enum(_) => {
                return Ok(match reader.get(key) {
                    Some(Scalar::Int(v)) => Value::Int(*v),
                    _ => default,
                });
            }
            FieldType::Float => {
                return Ok(match reader.get(key) {
                    Some(Scalar::Float(v)) => Value::Float(*v),
                    Some(Scalar::Int(v)) => Value::Float(*v as f64),
                    _ => default,
                });
            }
            FieldType::String => {
                return Ok(match reader.get(key) {
                    Some(Scalar::String(v)) => Value::String(v.clone()),
                    _ => default,
                });
            }
            _ => {}
        }

        if let Some(serializer) = self.serializers.find_for(ty) {
            let mut adapter = ReadAdapter::new(*self, reader, key);
            return serializer.deserialize(&mut adapter, default);
        }

        match ty {
            FieldType::List(elem) => {
                let Some(len) = read_count(reader, key, COUNT_KEY)? else {
                    return Ok(default);
                };
                let items = self.decode_items(elem, key, reader, len)?;
                Ok(Value::List(items))
            }
            FieldType::Map(key_ty, value_ty) => {
                let Some(len) = read_count(reader, key, COUNT_KEY)? else {
                    return Ok(default);
                };
                let keys_prefix = key_path(key, KEYS_KEY);
                let values_prefix = key_path(key, VALUES_KEY);
                let mut entries = Vec::with_capacity(len);
                for i in 0..len {
                    let k = self.decode(
                        key_ty,
                        &key_path(&keys_prefix, i),
                        reader,
                        key_ty.zero_value(),
                    )?;
                    let v = self.decode(
                        value_ty,
                        &key_path(&values_prefix, i),
                        reader,
                        value_ty.zero_value(),
                    )?;
                    entries.push((k, v));
                }
                Ok(Value::Map(entries))
            }
            FieldType::Record(descriptor) => {
                let mut record = match default {
                    Value::Record(record) => record,
                    _ => (descriptor.construct)(),
                };
                for field in &mut record.fields {
                    let fallback = std::mem::replace(&mut field.value, Value::Null);
                    field.value =
                        self.decode(&field.ty, &key_path(key, field.name), reader, fallback)?;
                }
                Ok(Value::Record(record))
            }
            FieldType::Entity => {
                log::warn!("no serializer registered for entity handles; '{key}' keeps its default");
                Ok(default)
            }
            _ => Ok(default),
        }
    }

    fn decode_items(
        &self,
        elem: &FieldType,
        key: &str,
        reader: &mut FlatReader<'_>,
        len: usize,
    ) -> Result<Vec<Value>, PersistError> {
        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            items.push(self.decode(elem, &key_path(key, i), reader, elem.zero_value())?);
        }
        Ok(items)
    }
}

/// Reads a collection sentinel. `Ok(None)` means the collection is not in the file.
///
/// A count larger than the number of keys in the payload cannot be backed by
/// entries and is rejected.
fn read_count(
    reader: &mut FlatReader<'_>,
    key: &str,
    sentinel: &str,
) -> Result<Option<usize>, PersistError> {
    let sentinel_key = key_path(key, sentinel);
    let Some(Scalar::Int(n)) = reader.get(&sentinel_key) else {
        return Ok(None);
    };
    let Ok(len) = usize::try_from(*n) else {
        return Ok(None);
    };
    if len > reader.len() {
        return Err(PersistError::MalformedPayload(format!(
            "'{sentinel_key}' claims {len} entries but the payload holds {} keys",
            reader.len()
        )));
    }
    Ok(Some(len))
}
