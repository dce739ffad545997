//! Named entity templates.
//!
//! A template id is stored with every saved entity. On load the entity is
//! rebuilt by instantiating its template (which attaches the members in
//! their original order) and then overwriting member fields from the file.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::member::Member;
use crate::world::World;

type TemplateFn = Box<dyn Fn() -> Vec<Box<dyn Member>> + Send + Sync>;

/// Template id → member factory.
#[derive(Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, TemplateFn>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory producing the template's default members.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        factory: impl Fn() -> Vec<Box<dyn Member>> + Send + Sync + 'static,
    ) {
        let id = id.into();
        if self.templates.insert(id.clone(), Box::new(factory)).is_some() {
            log::debug!("template '{id}' re-registered");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Builds a fresh member set for `id`.
    pub fn instantiate(&self, id: &str) -> Option<Vec<Box<dyn Member>>> {
        self.templates.get(id).map(|factory| factory())
    }

    /// Spawns an entity from template `id` and records the template on it.
    pub fn spawn(&self, world: &mut World, id: &str, name: impl Into<String>) -> Option<Entity> {
        let members = self.instantiate(id)?;
        let entity = world.spawn_with(name, members);
        world.set_template(entity, id);
        Some(entity)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
