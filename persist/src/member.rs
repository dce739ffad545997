//! Field tables and callbacks for persisted objects.
//!
//! [`Reflect`] is the object-safe field table every persisted record
//! exposes: its persisted fields as `(name, declared type, value)` triples
//! and a setter to write decoded values back. [`Record`] adds the static
//! side (type name, descriptor, default construction). [`Member`] marks a
//! record that can be attached to an entity and receives lifecycle
//! callbacks from the loader.
//!
//! Use `#[derive(Persist)]` from [`persist_macro`] to implement `Reflect`,
//! `Record` and [`Persist`] together.
//!
//! ```ignore
//! #[derive(Default, Persist)]
//! struct Health {
//!     current: f32,
//!     max: f32,
//! }
//!
//! impl Member for Health {}
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::entity::Entity;
use crate::serialize::{
    Field, FieldType, MemberLink, Persist, PersistError, ReadAdapter, RecordValue,
    TypeDescriptor, Value,
};

/// Object-safe access to a record's persisted fields.
pub trait Reflect: Any {
    /// The exact runtime type name (e.g. `"Health"`).
    fn type_name(&self) -> &'static str;

    /// The static descriptor of the runtime type.
    fn descriptor(&self) -> &'static TypeDescriptor;

    /// Current persisted fields, in declaration order.
    fn persisted_fields(&self) -> Vec<Field>;

    /// Writes a decoded value into the named field.
    ///
    /// Returns [`PersistError::FieldError`] if the value does not fit the
    /// field's type (the field is left unchanged) and
    /// [`PersistError::UnknownField`] for names the record does not have.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), PersistError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Static side of a persisted record type.
pub trait Record: Reflect + Default + Sized {
    /// The struct name as a static string.
    const NAME: &'static str;

    /// The descriptor shared by every instance of this type.
    fn type_descriptor() -> &'static TypeDescriptor;

    /// Snapshot of this instance's persisted fields.
    fn to_record_value(&self) -> RecordValue {
        RecordValue {
            descriptor: Self::type_descriptor(),
            fields: self.persisted_fields(),
        }
    }

    /// Builds an instance from a record value, starting from `Default`.
    ///
    /// Fields missing from `record`, unknown to this type, or holding values
    /// that do not fit keep their default.
    fn from_record_value(record: RecordValue) -> Self {
        let mut instance = Self::default();
        for field in record.fields {
            if let Err(err) = instance.set_field(field.name, field.value) {
                log::debug!("{}: {err}", Self::NAME);
            }
        }
        instance
    }

    /// Record value of a default-constructed instance.
    fn construct_default() -> RecordValue {
        Self::default().to_record_value()
    }
}

/// A record attachable to an entity, with persistence lifecycle callbacks.
///
/// Every callback has an empty default.
pub trait Member: Reflect {
    /// Called on every member of an entity right before it is encoded.
    fn on_before_save(&mut self) {}

    /// Called once per persisted field found in the file that this member
    /// no longer declares.
    ///
    /// `reader` is scoped to this member's key prefix, so
    /// `reader.read("old_name", default)` reads the stale value.
    fn on_missing_property(
        &mut self,
        _name: &str,
        _reader: &mut ReadAdapter<'_, '_, '_>,
    ) -> Result<(), PersistError> {
        Ok(())
    }

    /// Called once this member's entity has been fully populated.
    fn on_entity_load_complete(&mut self) {}

    /// Called after every entity in the container has finished loading.
    fn on_all_entities_loaded(&mut self) {}
}

/// Typed reference to the `index`-th member of type `T` on an entity.
///
/// Persisted as the entity's identity plus the member index, so it survives
/// a save/load cycle as long as members are attached in the same order.
/// Use `Option<MemberRef<T>>` for fields: an unresolvable reference decodes
/// to the field's default.
pub struct MemberRef<T> {
    entity: Entity,
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MemberRef<T> {
    pub(crate) fn new(entity: Entity, index: u32) -> Self {
        Self {
            entity,
            index,
            _marker: PhantomData,
        }
    }

    /// The entity hosting the member.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Position among the entity's members of type `T`.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<T> Clone for MemberRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MemberRef<T> {}

impl<T> PartialEq for MemberRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.index == other.index
    }
}

impl<T> Eq for MemberRef<T> {}

impl<T> fmt::Debug for MemberRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemberRef<{}>({}#{})",
            std::any::type_name::<T>(),
            self.entity,
            self.index
        )
    }
}

impl<T: Record> Persist for MemberRef<T> {
    fn field_type() -> FieldType {
        FieldType::Reference(T::NAME)
    }

    fn to_value(&self) -> Value {
        Value::Reference(MemberLink {
            entity: self.entity,
            index: self.index,
        })
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Reference(link) => Some(MemberRef::new(link.entity, link.index)),
            _ => None,
        }
    }
}
