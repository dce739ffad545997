//! Stable identity → live entity lookup.
//!
//! Persisted references never store entity handles; they store the target's
//! identity string and a member index. The [`ReferenceRegistry`] turns those
//! back into live handles on load, and handles back into identities on save.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::serialize::MemberLink;

struct RegistryEntry {
    entity: Entity,
    /// Exact type name of each attached member, in attach order.
    members: Vec<&'static str>,
}

/// Maps entity identities to live entities and their member rosters.
///
/// The roster is mirrored here (rather than read from the world) so that
/// references can be resolved while the world's members are mutably
/// borrowed during decoding.
#[derive(Default)]
pub struct ReferenceRegistry {
    entries: HashMap<String, RegistryEntry>,
    identities: HashMap<Entity, String>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity` under `identity` with its current member roster.
    ///
    /// Re-registering the same pair refreshes the roster. An identity already
    /// held by a different entity (or an entity that already has another
    /// identity) is a conflict: it is logged, the first registration is
    /// kept, and `false` is returned.
    pub fn register(
        &mut self,
        identity: impl Into<String>,
        entity: Entity,
        members: Vec<&'static str>,
    ) -> bool {
        let identity = identity.into();

        if let Some(existing) = self.entries.get_mut(&identity) {
            if existing.entity != entity {
                log::warn!(
                    "identity '{identity}' is already registered to {}; ignoring registration for {entity}",
                    existing.entity
                );
                return false;
            }
            existing.members = members;
            return true;
        }

        if let Some(current) = self.identities.get(&entity) {
            log::warn!(
                "{entity} is already registered as '{current}'; ignoring new identity '{identity}'"
            );
            return false;
        }

        self.identities.insert(entity, identity.clone());
        self.entries
            .insert(identity, RegistryEntry { entity, members });
        true
    }

    /// Removes an identity. Returns the entity it pointed to.
    pub fn unregister(&mut self, identity: &str) -> Option<Entity> {
        let entry = self.entries.remove(identity)?;
        self.identities.remove(&entry.entity);
        Some(entry.entity)
    }

    /// Removes whatever identity `entity` is registered under.
    pub fn unregister_entity(&mut self, entity: Entity) -> Option<String> {
        let identity = self.identities.remove(&entity)?;
        self.entries.remove(&identity);
        Some(identity)
    }

    /// Replaces the member roster of a registered entity.
    pub(crate) fn set_roster(&mut self, entity: Entity, members: Vec<&'static str>) {
        if let Some(identity) = self.identities.get(&entity) {
            if let Some(entry) = self.entries.get_mut(identity) {
                entry.members = members;
            }
        }
    }

    /// Resolves an identity to its live entity.
    pub fn resolve_object(&self, identity: &str) -> Option<Entity> {
        self.entries.get(identity).map(|entry| entry.entity)
    }

    /// Resolves the `index`-th member of exact type `type_name` on the entity
    /// registered as `identity`.
    ///
    /// Members are counted in attach order. An index past the end yields
    /// `None`: a shrunk member list is an expected schema change.
    pub fn resolve_component(
        &self,
        identity: &str,
        type_name: &str,
        index: u32,
    ) -> Option<MemberLink> {
        let entry = self.entries.get(identity)?;
        let count = entry
            .members
            .iter()
            .filter(|name| **name == type_name)
            .count();
        ((index as usize) < count).then_some(MemberLink {
            entity: entry.entity,
            index,
        })
    }

    /// Returns the identity `entity` is registered under.
    pub fn identity_of(&self, entity: Entity) -> Option<&str> {
        self.identities.get(&entity).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
