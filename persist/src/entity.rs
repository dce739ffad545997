use std::hash::{Hash, Hasher};

/// A generational handle to an entity living in a [`World`](crate::World).
///
/// Layout: `u32 id` + `u64 spawn_tick`.
///
/// - **id**: slot index in the entity allocator
/// - **spawn_tick**: world tick when this entity was spawned. If a slot is
///   reused the new spawn_tick differs, so handles to despawned entities
///   never resolve to the slot's new occupant.
///
/// Handles are process-local. What survives a save/load cycle is the
/// entity's identity string, tracked by the [`ReferenceRegistry`](crate::ReferenceRegistry).
#[derive(Clone, Copy)]
pub struct Entity {
    id: u32,
    spawn_tick: u64,
}

impl Entity {
    /// Creates a new entity handle from an index and spawn tick.
    pub(crate) fn new(index: u32, spawn_tick: u64) -> Self {
        Self {
            id: index,
            spawn_tick,
        }
    }

    /// Returns the slot index of this entity.
    pub fn index(&self) -> u32 {
        self.id
    }

    /// Returns the spawn tick of this entity.
    pub fn spawn_tick(&self) -> u64 {
        self.spawn_tick
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.spawn_tick == other.spawn_tick
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.spawn_tick.hash(state);
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}@{})", self.index(), self.spawn_tick())
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}@{})", self.index(), self.spawn_tick())
    }
}

/// Allocates and recycles entity IDs with spawn-tick tracking.
///
/// When an entity is despawned, its slot is added to a free list.
/// The next spawn reuses the slot with the current world tick as the
/// new spawn_tick, invalidating any old Entity handles.
pub(crate) struct EntityAllocator {
    /// Spawn tick for each slot. Index = entity index.
    spawn_ticks: Vec<u64>,
    /// Alive flag per slot.
    alive: Vec<bool>,
    /// Free list of recyclable indices (LIFO stack).
    free_list: Vec<u32>,
    /// Total number of currently alive entities.
    count: u32,
}

impl EntityAllocator {
    /// Creates a new empty allocator.
    pub fn new() -> Self {
        Self {
            spawn_ticks: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            count: 0,
        }
    }

    /// Allocates a new entity, reusing a recycled slot if available.
    /// `tick` is the current world tick used as the spawn_tick.
    pub fn allocate(&mut self, tick: u64) -> Entity {
        self.count += 1;

        if let Some(index) = self.free_list.pop() {
            let idx = index as usize;
            self.alive[idx] = true;
            self.spawn_ticks[idx] = tick;
            Entity::new(index, tick)
        } else {
            let index = self.spawn_ticks.len() as u32;
            self.spawn_ticks.push(tick);
            self.alive.push(true);
            Entity::new(index, tick)
        }
    }

    /// Deallocates an entity. Returns false if already dead or spawn_tick mismatch.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let idx = entity.index() as usize;
        self.alive[idx] = false;
        // Increment spawn_tick so any old handles are invalidated on reuse
        self.spawn_ticks[idx] = self.spawn_ticks[idx].wrapping_add(1);
        self.free_list.push(entity.index());
        self.count -= 1;
        true
    }

    /// Returns whether the entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.alive.len() && self.alive[idx] && self.spawn_ticks[idx] == entity.spawn_tick()
    }

    /// Returns the number of alive entities.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Iterates over all currently alive entity IDs in slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(idx, _)| Entity::new(idx as u32, self.spawn_ticks[idx]))
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
