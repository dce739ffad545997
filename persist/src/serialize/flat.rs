//! Flat key-path maps.
//!
//! One entity's persisted state is a [`FlatMap`]: dotted key paths mapped to
//! closed-set [`Scalar`]s, plus a disjoint set of keys that were explicitly
//! null at save time. Composite values occupy many keys under a shared prefix.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::PersistError;
use super::format::{self, Format};

/// Sentinel suffix recording the element count of sequences and maps.
pub const COUNT_KEY: &str = "Count";
/// Sentinel suffix recording the element count of arrays.
pub const LENGTH_KEY: &str = "Length";
/// Prefix segment for associative-container keys.
pub const KEYS_KEY: &str = "Keys";
/// Prefix segment for associative-container values.
pub const VALUES_KEY: &str = "Values";

/// Joins a key prefix and one path segment with `.`.
pub fn key_path(prefix: &str, segment: impl fmt::Display) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// The closed set of values stored in a flat map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Key-path → scalar map plus a disjoint set of explicitly null keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatMap {
    values: BTreeMap<String, Scalar>,
    nulls: BTreeSet<String>,
}

impl FlatMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a scalar, clearing any null marker for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: Scalar) {
        let key = key.into();
        self.nulls.remove(&key);
        self.values.insert(key, value);
    }

    /// Marks a key as explicitly null, clearing any stored scalar.
    pub fn insert_null(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.values.remove(&key);
        self.nulls.insert(key);
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.values.get(key)
    }

    pub fn is_null(&self, key: &str) -> bool {
        self.nulls.contains(key)
    }

    /// Returns `true` if the key holds a scalar or a null marker.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.nulls.contains(key)
    }

    /// Number of keys across both the value map and the null set.
    pub fn len(&self) -> usize {
        self.values.len() + self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.nulls.is_empty()
    }

    /// Iterates every key (values first, then nulls), each in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .chain(self.nulls.iter())
            .map(String::as_str)
    }

    /// Serializes the map as two length-prefixed blobs: value map, then null set.
    pub fn to_payload(&self, format: Format) -> Result<Vec<u8>, PersistError> {
        let values = format::encode(&self.values, format)?;
        let nulls = format::encode(&self.nulls, format)?;
        let mut out = Vec::with_capacity(8 + values.len() + nulls.len());
        write_blob(&mut out, &values)?;
        write_blob(&mut out, &nulls)?;
        Ok(out)
    }

    /// Inverse of [`to_payload`](Self::to_payload).
    ///
    /// A key found in both sections keeps its scalar.
    pub fn from_payload(bytes: &[u8], format: Format) -> Result<Self, PersistError> {
        let mut rest = bytes;
        let values_bytes = read_blob(&mut rest)?;
        let nulls_bytes = read_blob(&mut rest)?;
        if !rest.is_empty() {
            return Err(PersistError::MalformedPayload(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }

        let values: BTreeMap<String, Scalar> = format::decode(values_bytes, format)?;
        let mut nulls: BTreeSet<String> = format::decode(nulls_bytes, format)?;
        nulls.retain(|key| !values.contains_key(key));
        Ok(Self { values, nulls })
    }
}

fn write_blob(out: &mut Vec<u8>, blob: &[u8]) -> Result<(), PersistError> {
    let len = u32::try_from(blob.len())
        .map_err(|_| PersistError::MalformedPayload(format!("blob of {} bytes", blob.len())))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(blob);
    Ok(())
}

fn read_blob<'a>(rest: &mut &'a [u8]) -> Result<&'a [u8], PersistError> {
    let Some((len_bytes, tail)) = rest.split_first_chunk::<4>() else {
        return Err(PersistError::MalformedPayload("missing length prefix".into()));
    };
    let len = u32::from_le_bytes(*len_bytes) as usize;
    if tail.len() < len {
        return Err(PersistError::MalformedPayload(format!(
            "blob claims {len} bytes, {} available",
            tail.len()
        )));
    }
    let (blob, tail) = tail.split_at(len);
    *rest = tail;
    Ok(blob)
}

/// Read cursor over a [`FlatMap`] that records every key it touches.
///
/// After an entity is decoded, [`unread_keys`](Self::unread_keys) lists the
/// keys no current field asked for: data written by fields that no longer
/// exist in code.
pub struct FlatReader<'m> {
    map: &'m FlatMap,
    read: HashSet<String>,
}

impl<'m> FlatReader<'m> {
    pub fn new(map: &'m FlatMap) -> Self {
        Self {
            map,
            read: HashSet::new(),
        }
    }

    /// Looks up a scalar, marking the key as read.
    pub fn get(&mut self, key: &str) -> Option<&'m Scalar> {
        let value = self.map.get(key);
        if value.is_some() {
            self.read.insert(key.to_owned());
        }
        value
    }

    /// Checks the null set, marking the key as read on a hit.
    pub fn take_null(&mut self, key: &str) -> bool {
        let hit = self.map.is_null(key);
        if hit {
            self.read.insert(key.to_owned());
        }
        hit
    }

    /// Returns `true` if the key is present, without marking it read.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of keys in the underlying map, read or not.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keys present in the map that were never read, in sorted order.
    pub fn unread_keys(&self) -> Vec<&'m str> {
        let mut keys: Vec<&'m str> = self
            .map
            .keys()
            .filter(|key| !self.read.contains(*key))
            .collect();
        keys.sort_unstable();
        keys
    }
}
