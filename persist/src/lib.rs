//! # RedLilium Persist
//!
//! Saves a graph of live entities to a binary container and rebuilds an
//! equivalent graph later, keeping references between entities intact and
//! tolerating schema drift between the two.
//!
//! ## Core Types
//!
//! - [`World`]: entities, their members, and the identity registry
//! - [`Member`] / [`Reflect`] / [`Record`]: persisted field tables, usually
//!   via `#[derive(Persist)]`
//! - [`MemberRef`]: typed reference to a member that survives save/load
//! - [`ReferenceRegistry`]: stable identity → live entity
//! - [`TemplateCatalog`]: rebuilds entities from their template id on load
//! - [`Persistence`]: container save/load with per-entity fault isolation
//!
//! ## Encoding
//!
//! - [`ValueCodec`]: one value ⇄ flat `key.path → scalar` entries
//! - [`CustomSerializerTable`]: per-type overrides with base-type fallback
//! - [`PersistConfig`]: payload [`Format`] and structural limits
//!
//! ```
//! use redlilium_persist::{Member, Persist, Persistence, TemplateCatalog, World};
//!
//! #[derive(Default, Persist)]
//! struct Score { points: i64 }
//! impl Member for Score {}
//!
//! let mut templates = TemplateCatalog::new();
//! templates.register("score", || vec![Box::new(Score::default()) as Box<dyn Member>]);
//! let persistence = Persistence::new(templates);
//!
//! let mut world = World::new();
//! let entity = persistence.templates().spawn(&mut world, "score", "p1").unwrap();
//! let score = world.find_member::<Score>(entity).unwrap();
//! world.member_mut(score).unwrap().points = 99;
//!
//! let mut bytes = Vec::new();
//! persistence.save(&mut world, &mut bytes).unwrap();
//!
//! let mut restored = World::new();
//! let report = persistence.load(&mut restored, bytes.as_slice()).unwrap();
//! let score = restored.find_member::<Score>(report.loaded[0]).unwrap();
//! assert_eq!(restored.member(score).unwrap().points, 99);
//! ```

// Lets `#[derive(Persist)]` paths resolve inside this crate too.
extern crate self as redlilium_persist;

mod config;
mod container;
mod entity;
mod member;
mod registry;
pub mod serialize;
mod template;
mod world;

pub use config::PersistConfig;
pub use container::{
    EntityFailure, FailureReason, LoadReport, Persistence, SaveReport, CONTAINER_MAGIC,
};
pub use entity::Entity;
pub use member::{Member, MemberRef, Record, Reflect};
pub use persist_macro::Persist;
pub use registry::ReferenceRegistry;
pub use serialize::{
    ContainerError, CustomSerializerTable, Field, FieldType, Format, Persist, PersistError,
    ReadAdapter, RecordValue, TypeDescriptor, Value, ValueCodec, WriteAdapter,
};
pub use template::TemplateCatalog;
pub use world::{LoadingScope, World};
