//! Runtime value representation for persisted fields.
//!
//! A member exposes its persisted state as a list of [`Field`]s, each a
//! `(name, declared type, current value)` triple. The [`Persist`] trait
//! converts concrete Rust field types to and from [`Value`], and reports the
//! [`FieldType`] the codec dispatches on.
//!
//! Composite records carry a static [`TypeDescriptor`] generated by
//! `#[derive(Persist)]`. The descriptor names the type, links to its declared
//! base type (for custom serializer fallback), and constructs a fresh default
//! instance for decoding.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

use crate::entity::Entity;

/// Static per-type metadata for a composite record.
pub struct TypeDescriptor {
    /// The type name (e.g. `"Inventory"`). Used as the key-path segment for
    /// members and as the custom serializer lookup key.
    pub name: &'static str,
    /// The declared base type, if any.
    pub base: Option<fn() -> &'static TypeDescriptor>,
    /// Builds a record value from a default-constructed instance.
    pub construct: fn() -> RecordValue,
}

impl TypeDescriptor {
    /// Iterates this type followed by its declared ancestors, nearest first.
    pub fn ancestry(&'static self) -> impl Iterator<Item = &'static TypeDescriptor> {
        std::iter::successors(Some(self), |desc| desc.base.map(|base| base()))
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.name)
    }
}

/// Declared type of a persisted field.
///
/// The codec dispatches on this, never on the runtime value alone.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// `Option<T>`: `None` is persisted as an explicit null.
    Nullable(Box<FieldType>),
    Bool,
    /// Any integer width, widened to `i64`.
    Int,
    /// `f32`/`f64`, widened to `f64`.
    Float,
    String,
    /// Fieldless enum stored as its discriminant.
    Enum(&'static str),
    /// Reference to a member of the named type on some entity.
    Reference(&'static str),
    /// Reference to an entity itself.
    Entity,
    /// Fixed-size array (`[T; N]`, `Box<[T]>`), sentinel `.Length`.
    Array(Box<FieldType>),
    /// Ordered sequence (`Vec<T>`, `VecDeque<T>`), sentinel `.Count`.
    List(Box<FieldType>),
    /// Associative container, sentinel `.Count`.
    Map(Box<FieldType>, Box<FieldType>),
    /// Composite record described by a [`TypeDescriptor`].
    Record(&'static TypeDescriptor),
}

impl FieldType {
    /// Strips any [`Nullable`](FieldType::Nullable) wrappers.
    pub fn non_null(&self) -> &FieldType {
        match self {
            FieldType::Nullable(inner) => inner.non_null(),
            other => other,
        }
    }

    /// The value a field of this type takes when the file holds an explicit null.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::Nullable(_) | FieldType::Reference(_) | FieldType::Entity => Value::Null,
            FieldType::Bool => Value::Bool(false),
            FieldType::Int | FieldType::Enum(_) => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::Array(_) => Value::Array(Vec::new()),
            FieldType::List(_) => Value::List(Vec::new()),
            FieldType::Map(_, _) => Value::Map(Vec::new()),
            FieldType::Record(desc) => Value::Record((desc.construct)()),
        }
    }
}

/// A resolved link to the `index`-th member of some type on `entity`.
///
/// The member type comes from the declaring [`FieldType::Reference`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberLink {
    pub entity: Entity,
    pub index: u32,
}

/// A persisted field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Reference(MemberLink),
    Entity(Entity),
    Array(Vec<Value>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(RecordValue),
}

impl Value {
    /// Short kind name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Reference(_) => "reference",
            Value::Entity(_) => "entity",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }
}

/// One `(name, declared type, current value)` triple.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub value: Value,
}

impl Field {
    /// Builds a field triple from a typed Rust value.
    pub fn new<T: Persist>(name: &'static str, value: &T) -> Self {
        Self {
            name,
            ty: T::field_type(),
            value: value.to_value(),
        }
    }
}

/// The persisted fields of one composite record instance.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordValue {
    pub descriptor: &'static TypeDescriptor,
    pub fields: Vec<Field>,
}

impl RecordValue {
    /// Returns the value of the named field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Replaces the value of the named field. Returns `false` if absent.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Persist: Rust type <-> Value
// ---------------------------------------------------------------------------

/// Conversion between a Rust field type and a persisted [`Value`].
///
/// `#[derive(Persist)]` implements this for records and fieldless enums.
/// `from_value` returns `None` when the value does not fit the type; the
/// field then keeps its current value.
pub trait Persist: Sized {
    /// The declared type the codec dispatches on.
    fn field_type() -> FieldType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Option<Self>;
}

impl Persist for bool {
    fn field_type() -> FieldType {
        FieldType::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_persist_int {
    ($($ty:ty),*) => {
        $(
            impl Persist for $ty {
                fn field_type() -> FieldType {
                    FieldType::Int
                }

                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_persist_int!(i8, i16, i32, i64, isize, u8, u16, u32, usize);

// u64 round-trips through the i64 bit pattern.
impl Persist for u64 {
    fn field_type() -> FieldType {
        FieldType::Int
    }

    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v as u64),
            _ => None,
        }
    }
}

impl Persist for f64 {
    fn field_type() -> FieldType {
        FieldType::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl Persist for f32 {
    fn field_type() -> FieldType {
        FieldType::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Option<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl Persist for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl Persist for char {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(v) => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl Persist for Entity {
    fn field_type() -> FieldType {
        FieldType::Entity
    }

    fn to_value(&self) -> Value {
        Value::Entity(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }
}

impl<T: Persist> Persist for Option<T> {
    fn field_type() -> FieldType {
        FieldType::Nullable(Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn collect_items<T: Persist>(items: Vec<Value>) -> Option<Vec<T>> {
    items.into_iter().map(T::from_value).collect()
}

impl<T: Persist> Persist for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Persist::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) | Value::Array(items) => collect_items(items),
            _ => None,
        }
    }
}

impl<T: Persist> Persist for VecDeque<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Persist::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        Vec::<T>::from_value(value).map(VecDeque::from)
    }
}

impl<T: Persist> Persist for Box<[T]> {
    fn field_type() -> FieldType {
        FieldType::Array(Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Persist::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        Vec::<T>::from_value(value).map(Vec::into_boxed_slice)
    }
}

impl<T: Persist, const N: usize> Persist for [T; N] {
    fn field_type() -> FieldType {
        FieldType::Array(Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Persist::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        Vec::<T>::from_value(value).and_then(|items| items.try_into().ok())
    }
}

fn collect_entries<K: Persist, V: Persist>(entries: Vec<(Value, Value)>) -> Option<Vec<(K, V)>> {
    entries
        .into_iter()
        .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
        .collect()
}

impl<K: Persist + Eq + Hash, V: Persist> Persist for HashMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(K::field_type()), Box::new(V::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(entries) => collect_entries(entries).map(|e| e.into_iter().collect()),
            _ => None,
        }
    }
}

impl<K: Persist + Ord, V: Persist> Persist for BTreeMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(K::field_type()), Box::new(V::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(entries) => collect_entries(entries).map(|e| e.into_iter().collect()),
            _ => None,
        }
    }
}
