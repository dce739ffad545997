//! One entity's members ⇄ one flat map.
//!
//! Every persisted field of every member is written under
//! `<MemberType>.<index>.<field>`, where `index` counts members of the same
//! type in attach order. Loading mirrors the walk, then offers keys that no
//! current field read to [`Member::on_missing_property`].

use std::collections::{BTreeSet, HashMap};

use super::codec::ValueCodec;
use super::custom::ReadAdapter;
use super::error::PersistError;
use super::flat::{key_path, FlatMap, FlatReader};
use crate::member::Member;

/// Key prefix of each member, in attach order.
fn member_prefixes(members: &[Box<dyn Member>]) -> Vec<String> {
    let mut seen: HashMap<&'static str, u32> = HashMap::new();
    members
        .iter()
        .map(|member| {
            let type_name = member.type_name();
            let slot = seen.entry(type_name).or_insert(0);
            let prefix = key_path(type_name, *slot);
            *slot += 1;
            prefix
        })
        .collect()
}

/// Calls `on_before_save` on every member, then flattens all persisted fields.
pub fn save_entity(
    codec: ValueCodec<'_>,
    members: &mut [Box<dyn Member>],
) -> Result<FlatMap, PersistError> {
    for member in members.iter_mut() {
        member.on_before_save();
    }

    let mut map = FlatMap::new();
    for (member, prefix) in members.iter().zip(member_prefixes(members)) {
        for field in member.persisted_fields() {
            codec.encode(&field.ty, &field.value, &key_path(&prefix, field.name), &mut map)?;
        }
    }
    Ok(map)
}

/// Populates `members` from `map`.
///
/// Fields absent from the map keep their current value. A decoded value the
/// field rejects is logged and skipped. Stale keys are grouped by
/// `(type, index, field)` and each group is offered once to the owning
/// member's `on_missing_property`. Finally every member gets
/// `on_entity_load_complete`.
pub fn load_entity(
    codec: ValueCodec<'_>,
    members: &mut [Box<dyn Member>],
    map: &FlatMap,
) -> Result<(), PersistError> {
    let prefixes = member_prefixes(members);
    let mut reader = FlatReader::new(map);

    for (member, prefix) in members.iter_mut().zip(&prefixes) {
        for field in member.persisted_fields() {
            let key = key_path(prefix, field.name);
            let value = codec.decode(&field.ty, &key, &mut reader, field.value)?;
            if let Err(err) = member.set_field(field.name, value) {
                log::warn!("{key}: {err}");
            }
        }
    }

    let stale = stale_fields(&reader.unread_keys());
    for (type_name, index, field) in stale {
        let prefix = key_path(type_name, index);
        let Some(position) = prefixes.iter().position(|p| *p == prefix) else {
            log::debug!("no member '{prefix}' for stale field '{field}'");
            continue;
        };
        let member = &mut members[position];
        if member.persisted_fields().iter().any(|f| f.name == field) {
            // Leftover sub-keys of a field that still exists (e.g. after a type change).
            continue;
        }
        let mut adapter = ReadAdapter::new(codec, &mut reader, &prefix);
        member.on_missing_property(field, &mut adapter)?;
    }

    for member in members.iter_mut() {
        member.on_entity_load_complete();
    }
    Ok(())
}

/// Groups unread keys of shape `<Type>.<index>.<field>[...]`.
fn stale_fields<'m>(keys: &[&'m str]) -> BTreeSet<(&'m str, u32, &'m str)> {
    let mut groups = BTreeSet::new();
    for key in keys {
        let mut segments = key.splitn(4, '.');
        let parsed = (segments.next(), segments.next(), segments.next());
        match parsed {
            (Some(type_name), Some(index), Some(field)) => match index.parse::<u32>() {
                Ok(index) => {
                    groups.insert((type_name, index, field));
                }
                Err(_) => log::debug!("ignoring unexpected key '{key}'"),
            },
            _ => log::debug!("ignoring unexpected key '{key}'"),
        }
    }
    groups
}
