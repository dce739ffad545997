use std::ops::{Deref, DerefMut};

use uuid::Uuid;

use crate::entity::{Entity, EntityAllocator};
use crate::member::{Member, MemberRef, Record};
use crate::registry::ReferenceRegistry;

/// Per-entity data: display name, template id and attached members.
struct EntitySlot {
    name: String,
    template: Option<String>,
    members: Vec<Box<dyn Member>>,
}

/// The live object graph: entities, their members, and the identity registry.
///
/// Entities spawned while the world is not loading get a fresh UUID v4
/// identity. While a [`LoadingScope`] is active they get none; the loader
/// assigns the identity stored in the file instead.
///
/// ```
/// use redlilium_persist::{Member, Persist, World};
///
/// #[derive(Default, Persist)]
/// struct Health { current: i32 }
/// impl Member for Health {}
///
/// let mut world = World::new();
/// let hero = world.spawn("hero");
/// let health = world.add_member(hero, Health { current: 10 }).unwrap();
///
/// assert!(world.identity(hero).is_some());
/// assert_eq!(world.member(health).unwrap().current, 10);
/// ```
pub struct World {
    entities: EntityAllocator,
    slots: Vec<Option<EntitySlot>>,
    registry: ReferenceRegistry,
    loading: bool,
    /// Bumped on every spawn so recycled slots never repeat a spawn tick.
    tick: u64,
}

impl World {
    /// Creates a new empty world.
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            slots: Vec::new(),
            registry: ReferenceRegistry::new(),
            loading: false,
            tick: 0,
        }
    }

    // ---- Entity management ----

    /// Spawns an entity with no members.
    ///
    /// Outside a load the entity is registered under a new UUID v4 identity.
    pub fn spawn(&mut self, name: impl Into<String>) -> Entity {
        self.tick += 1;
        let entity = self.entities.allocate(self.tick);
        let idx = entity.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(EntitySlot {
            name: name.into(),
            template: None,
            members: Vec::new(),
        });

        if !self.loading {
            let identity = Uuid::new_v4().to_string();
            self.registry.register(identity, entity, Vec::new());
        }
        entity
    }

    /// Spawns an entity and attaches `members` in order.
    pub fn spawn_with(&mut self, name: impl Into<String>, members: Vec<Box<dyn Member>>) -> Entity {
        let entity = self.spawn(name);
        if let Some(slot) = self.slot_mut(entity) {
            slot.members = members;
        }
        self.refresh_roster(entity);
        entity
    }

    /// Despawns an entity, dropping its members and its identity.
    ///
    /// Returns `false` if the entity was already dead.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.deallocate(entity) {
            return false;
        }
        self.slots[entity.index() as usize] = None;
        self.registry.unregister_entity(entity);
        true
    }

    /// Returns whether the entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the number of alive entities.
    pub fn entity_count(&self) -> u32 {
        self.entities.count()
    }

    /// Iterates over all currently alive entities in slot order.
    pub fn iter_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    // ---- Identity, name and template ----

    /// Registers `entity` under `identity`, replacing any identity it had.
    ///
    /// Returns `false` (and changes nothing) if the entity is dead or the
    /// identity already belongs to another entity.
    pub fn assign_identity(&mut self, entity: Entity, identity: impl Into<String>) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let identity = identity.into();
        if let Some(owner) = self.registry.resolve_object(&identity) {
            if owner != entity {
                log::warn!("identity '{identity}' is already held by {owner}; not assigning to {entity}");
                return false;
            }
            return true;
        }
        self.registry.unregister_entity(entity);
        let roster = self.roster(entity);
        self.registry.register(identity, entity, roster)
    }

    /// The identity the entity is registered under.
    pub fn identity(&self, entity: Entity) -> Option<&str> {
        self.registry.identity_of(entity)
    }

    /// Resolves an identity to a live entity.
    pub fn entity_by_identity(&self, identity: &str) -> Option<Entity> {
        self.registry.resolve_object(identity)
    }

    pub fn name(&self, entity: Entity) -> Option<&str> {
        self.slot(entity).map(|slot| slot.name.as_str())
    }

    pub fn set_name(&mut self, entity: Entity, name: impl Into<String>) -> bool {
        match self.slot_mut(entity) {
            Some(slot) => {
                slot.name = name.into();
                true
            }
            None => false,
        }
    }

    /// The template the entity is rebuilt from on load.
    pub fn template(&self, entity: Entity) -> Option<&str> {
        self.slot(entity).and_then(|slot| slot.template.as_deref())
    }

    pub fn set_template(&mut self, entity: Entity, template: impl Into<String>) -> bool {
        match self.slot_mut(entity) {
            Some(slot) => {
                slot.template = Some(template.into());
                true
            }
            None => false,
        }
    }

    // ---- Members ----

    /// Attaches a member and returns a reference to it.
    ///
    /// Returns `None` if the entity is dead.
    pub fn add_member<T: Member + Record>(&mut self, entity: Entity, member: T) -> Option<MemberRef<T>> {
        let slot = self.slot_mut(entity)?;
        let index = slot
            .members
            .iter()
            .filter(|m| m.type_name() == T::NAME)
            .count() as u32;
        slot.members.push(Box::new(member));
        self.refresh_roster(entity);
        Some(MemberRef::new(entity, index))
    }

    /// Attaches an already boxed member. Returns `false` if the entity is dead.
    pub fn add_boxed_member(&mut self, entity: Entity, member: Box<dyn Member>) -> bool {
        let Some(slot) = self.slot_mut(entity) else {
            return false;
        };
        slot.members.push(member);
        self.refresh_roster(entity);
        true
    }

    /// Returns the referenced member, if its entity is alive and still has it.
    pub fn member<T: Member>(&self, member: MemberRef<T>) -> Option<&T> {
        self.slot(member.entity())?
            .members
            .iter()
            .filter_map(|m| m.as_any().downcast_ref::<T>())
            .nth(member.index() as usize)
    }

    pub fn member_mut<T: Member>(&mut self, member: MemberRef<T>) -> Option<&mut T> {
        self.slot_mut(member.entity())?
            .members
            .iter_mut()
            .filter_map(|m| m.as_any_mut().downcast_mut::<T>())
            .nth(member.index() as usize)
    }

    /// The first member of type `T` on the entity.
    pub fn find_member<T: Member>(&self, entity: Entity) -> Option<MemberRef<T>> {
        self.members_of::<T>(entity).into_iter().next()
    }

    /// All members of type `T` on the entity, in attach order.
    pub fn members_of<T: Member>(&self, entity: Entity) -> Vec<MemberRef<T>> {
        let Some(slot) = self.slot(entity) else {
            return Vec::new();
        };
        let count = slot.members.iter().filter(|m| m.as_any().is::<T>()).count();
        (0..count as u32).map(|i| MemberRef::new(entity, i)).collect()
    }

    /// Detaches the referenced member.
    ///
    /// Later members of the same type shift down one index.
    pub fn remove_member<T: Member>(&mut self, member: MemberRef<T>) -> bool {
        let entity = member.entity();
        let Some(slot) = self.slot_mut(entity) else {
            return false;
        };
        let position = slot
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.as_any().is::<T>())
            .map(|(pos, _)| pos)
            .nth(member.index() as usize);
        let Some(position) = position else {
            return false;
        };
        slot.members.remove(position);
        self.refresh_roster(entity);
        true
    }

    /// All members of the entity, in attach order.
    pub fn members(&self, entity: Entity) -> Option<&[Box<dyn Member>]> {
        self.slot(entity).map(|slot| slot.members.as_slice())
    }

    /// The registry alongside one entity's members, borrowed at once.
    pub(crate) fn split_entity_mut(
        &mut self,
        entity: Entity,
    ) -> Option<(&ReferenceRegistry, &mut [Box<dyn Member>])> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let slot = self.slots.get_mut(entity.index() as usize)?.as_mut()?;
        Some((&self.registry, slot.members.as_mut_slice()))
    }

    // ---- Loading state ----

    /// Returns `true` while a [`LoadingScope`] is active.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Marks the world as loading until the returned guard is dropped.
    pub fn begin_loading(&mut self) -> LoadingScope<'_> {
        let was_loading = self.loading;
        self.loading = true;
        LoadingScope {
            world: self,
            was_loading,
        }
    }

    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    // ---- Internal ----

    fn slot(&self, entity: Entity) -> Option<&EntitySlot> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.slots.get(entity.index() as usize)?.as_ref()
    }

    fn slot_mut(&mut self, entity: Entity) -> Option<&mut EntitySlot> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.slots.get_mut(entity.index() as usize)?.as_mut()
    }

    fn roster(&self, entity: Entity) -> Vec<&'static str> {
        self.slot(entity)
            .map(|slot| slot.members.iter().map(|m| m.type_name()).collect())
            .unwrap_or_default()
    }

    fn refresh_roster(&mut self, entity: Entity) {
        let roster = self.roster(entity);
        self.registry.set_roster(entity, roster);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a [`World`] in loading state; restores the previous state on drop.
///
/// Dereferences to the world, so loading code works through the guard.
pub struct LoadingScope<'w> {
    world: &'w mut World,
    was_loading: bool,
}

impl Deref for LoadingScope<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl DerefMut for LoadingScope<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.world
    }
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.world.loading = self.was_loading;
    }
}
