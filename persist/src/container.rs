//! Save container: header, entity directory, payload blocks.
//!
//! Layout (little-endian):
//!
//! ```text
//! u32 magic              CONTAINER_MAGIC
//! u32 count              N
//! N x directory row      string identity, string template, string name
//! N x block              string identity, u32 len, len bytes of payload
//! string                 u32 byte length + UTF-8 bytes
//! ```
//!
//! The whole directory is read and every entity spawned before any payload
//! is decoded, so references to entities later in the file resolve.
//! Failures inside one entity are contained: the entity is despawned and
//! listed in the [`LoadReport`]. Structural faults abort the call with a
//! [`ContainerError`].

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::PersistConfig;
use crate::entity::Entity;
use crate::serialize::{
    load_entity, save_entity, ContainerError, CustomSerializerTable, FlatMap, PersistError,
    ValueCodec,
};
use crate::template::TemplateCatalog;
use crate::world::World;

/// Container header tag.
pub const CONTAINER_MAGIC: u32 = u32::from_le_bytes(*b"RLPG");

/// Why one entity was left out of a save or load.
#[derive(Debug)]
pub enum FailureReason {
    /// The directory names a template the catalog does not know.
    UnknownTemplate(String),
    /// The identity is already held by another live entity.
    IdentityConflict,
    /// The directory lists the entity but no payload block follows.
    MissingBlock,
    /// Encoding or decoding the entity's payload failed.
    Payload(PersistError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTemplate(id) => write!(f, "unknown template '{id}'"),
            Self::IdentityConflict => write!(f, "identity already in use"),
            Self::MissingBlock => write!(f, "no payload block"),
            Self::Payload(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug)]
pub struct EntityFailure {
    pub identity: String,
    pub reason: FailureReason,
}

/// Outcome of a successful save.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Entities written to the container.
    pub written: usize,
    /// Entities skipped because they have no identity or template.
    pub skipped: Vec<Entity>,
    /// Entities whose payload failed to encode.
    pub failures: Vec<EntityFailure>,
}

/// Outcome of a successful load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded entities in directory order.
    pub loaded: Vec<Entity>,
    /// Directory rows that did not produce a live entity.
    pub failures: Vec<EntityFailure>,
}

/// One fully encoded entity, ready to be written.
struct EncodedEntity {
    identity: String,
    template: String,
    name: String,
    payload: Vec<u8>,
}

/// One directory row read from a container.
struct DirectoryRow {
    identity: String,
    template: String,
    name: String,
}

/// Saves and loads a [`World`] using a template catalog, a custom serializer
/// table and a [`PersistConfig`].
pub struct Persistence {
    templates: TemplateCatalog,
    serializers: CustomSerializerTable,
    config: PersistConfig,
}

impl Persistence {
    /// Creates a persistence front end with the built-in serializers and
    /// default config.
    pub fn new(templates: TemplateCatalog) -> Self {
        Self {
            templates,
            serializers: CustomSerializerTable::with_builtins(),
            config: PersistConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PersistConfig) -> Self {
        self.config = config;
        self
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateCatalog {
        &mut self.templates
    }

    pub fn serializers(&self) -> &CustomSerializerTable {
        &self.serializers
    }

    pub fn serializers_mut(&mut self) -> &mut CustomSerializerTable {
        &mut self.serializers
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    // ---- Save ----

    /// Writes every live entity that has an identity and a template known to
    /// the catalog.
    ///
    /// Every entity is encoded before the header is written, so a failing
    /// entity is simply left out of the count.
    pub fn save(&self, world: &mut World, mut writer: impl Write) -> Result<SaveReport, ContainerError> {
        let mut report = SaveReport::default();
        let mut encoded = Vec::new();

        let entities: Vec<Entity> = world.iter_entities().collect();
        for entity in entities {
            let (Some(identity), Some(template)) = (world.identity(entity), world.template(entity))
            else {
                log::warn!(
                    "skipping {entity} ('{}'): no identity or template",
                    world.name(entity).unwrap_or_default()
                );
                report.skipped.push(entity);
                continue;
            };
            if !self.templates.contains(template) {
                log::warn!("skipping {entity} ('{identity}'): template '{template}' is not registered");
                report.skipped.push(entity);
                continue;
            }
            let identity = identity.to_owned();
            let template = template.to_owned();
            let name = world.name(entity).unwrap_or_default().to_owned();

            match self.encode_entity(world, entity) {
                Ok(payload) => encoded.push(EncodedEntity {
                    identity,
                    template,
                    name,
                    payload,
                }),
                Err(err) => {
                    log::error!("failed to save entity '{identity}': {err}");
                    report.failures.push(EntityFailure {
                        identity,
                        reason: FailureReason::Payload(err),
                    });
                }
            }
        }

        write_u32(&mut writer, CONTAINER_MAGIC)?;
        write_u32(&mut writer, length_prefix(encoded.len())?)?;
        for entry in &encoded {
            write_string(&mut writer, &entry.identity)?;
            write_string(&mut writer, &entry.template)?;
            write_string(&mut writer, &entry.name)?;
        }
        for entry in &encoded {
            write_string(&mut writer, &entry.identity)?;
            write_u32(&mut writer, length_prefix(entry.payload.len())?)?;
            writer.write_all(&entry.payload)?;
        }
        writer.flush()?;

        report.written = encoded.len();
        log::info!(
            "saved {} entities ({} skipped, {} failed)",
            report.written,
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// [`save`](Self::save) into a newly created file.
    pub fn save_to_path(&self, world: &mut World, path: impl AsRef<Path>) -> Result<SaveReport, ContainerError> {
        let file = File::create(path.as_ref())?;
        self.save(world, BufWriter::new(file))
    }

    fn encode_entity(&self, world: &mut World, entity: Entity) -> Result<Vec<u8>, PersistError> {
        let Some((registry, members)) = world.split_entity_mut(entity) else {
            return Ok(FlatMap::new().to_payload(self.config.payload_format)?);
        };
        let codec = ValueCodec::new(&self.serializers, registry);
        let map = save_entity(codec, members)?;
        map.to_payload(self.config.payload_format)
    }

    // ---- Load ----

    /// Reads a container into `world`.
    ///
    /// The world is in loading state for the whole call. On a structural
    /// error, entities that finished decoding stay live and the ones still
    /// waiting for their block are despawned.
    pub fn load(&self, world: &mut World, mut reader: impl Read) -> Result<LoadReport, ContainerError> {
        let mut world = world.begin_loading();
        let mut report = LoadReport::default();

        let magic = read_u32(&mut reader)?;
        if magic != CONTAINER_MAGIC {
            return Err(ContainerError::BadMagic {
                expected: CONTAINER_MAGIC,
                found: magic,
            });
        }
        let count = read_u32(&mut reader)?;

        let mut rows = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            rows.push(DirectoryRow {
                identity: read_string(&mut reader, self.config.max_string_len)?,
                template: read_string(&mut reader, self.config.max_string_len)?,
                name: read_string(&mut reader, self.config.max_string_len)?,
            });
        }

        // Spawn every row before decoding anything so forward references resolve.
        let mut pending: HashMap<String, (usize, Entity)> = HashMap::new();
        for (row_index, row) in rows.into_iter().enumerate() {
            let Some(members) = self.templates.instantiate(&row.template) else {
                log::warn!("skipping '{}': unknown template '{}'", row.identity, row.template);
                report.failures.push(EntityFailure {
                    identity: row.identity,
                    reason: FailureReason::UnknownTemplate(row.template),
                });
                continue;
            };
            let entity = world.spawn_with(row.name, members);
            world.set_template(entity, row.template);
            if !world.assign_identity(entity, row.identity.as_str()) {
                world.despawn(entity);
                report.failures.push(EntityFailure {
                    identity: row.identity,
                    reason: FailureReason::IdentityConflict,
                });
                continue;
            }
            pending.insert(row.identity, (row_index, entity));
        }

        let mut loaded: Vec<(usize, Entity)> = Vec::with_capacity(pending.len());
        for _ in 0..count {
            let block = read_string(&mut reader, self.config.max_string_len).and_then(|identity| {
                let len = read_u32(&mut reader)?;
                if len > self.config.max_block_len {
                    return Err(ContainerError::LengthTooLarge {
                        what: "payload block",
                        len,
                        max: self.config.max_block_len,
                    });
                }
                Ok((identity, read_bytes(&mut reader, len)?))
            });
            let (identity, payload) = match block {
                Ok(block) => block,
                Err(err) => {
                    for (_, entity) in pending.into_values() {
                        world.despawn(entity);
                    }
                    log::error!("load aborted: {err}");
                    return Err(err);
                }
            };

            let Some((row_index, entity)) = pending.remove(&identity) else {
                log::debug!("ignoring block for '{identity}'");
                continue;
            };
            match self.decode_entity(&mut world, entity, &payload) {
                Ok(()) => loaded.push((row_index, entity)),
                Err(err) => {
                    log::error!("failed to load entity '{identity}': {err}");
                    world.despawn(entity);
                    report.failures.push(EntityFailure {
                        identity,
                        reason: FailureReason::Payload(err),
                    });
                }
            }
        }

        for (identity, (_, entity)) in pending {
            log::warn!("entity '{identity}' has no payload block");
            world.despawn(entity);
            report.failures.push(EntityFailure {
                identity,
                reason: FailureReason::MissingBlock,
            });
        }

        loaded.sort_unstable_by_key(|(row_index, _)| *row_index);
        for (_, entity) in &loaded {
            if let Some((_, members)) = world.split_entity_mut(*entity) {
                for member in members.iter_mut() {
                    member.on_all_entities_loaded();
                }
            }
        }

        report.loaded = loaded.into_iter().map(|(_, entity)| entity).collect();
        log::info!(
            "loaded {} entities ({} failed)",
            report.loaded.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// [`load`](Self::load) from a file.
    pub fn load_from_path(&self, world: &mut World, path: impl AsRef<Path>) -> Result<LoadReport, ContainerError> {
        let file = File::open(path.as_ref())?;
        self.load(world, BufReader::new(file))
    }

    fn decode_entity(&self, world: &mut World, entity: Entity, payload: &[u8]) -> Result<(), PersistError> {
        let map = FlatMap::from_payload(payload, self.config.payload_format)?;
        let Some((registry, members)) = world.split_entity_mut(entity) else {
            return Ok(());
        };
        let codec = ValueCodec::new(&self.serializers, registry);
        load_entity(codec, members, &map)
    }
}

// ---- Primitive IO ----

fn length_prefix(len: usize) -> Result<u32, ContainerError> {
    u32::try_from(len).map_err(|_| ContainerError::Oversize(len))
}

fn write_u32(writer: &mut impl Write, value: u32) -> Result<(), ContainerError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_string(writer: &mut impl Write, value: &str) -> Result<(), ContainerError> {
    write_u32(writer, length_prefix(value.len())?)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_u32(reader: &mut impl Read) -> Result<u32, ContainerError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
fn read_bytes(reader: &mut impl Read, len: u32) -> Result<Vec<u8>, ContainerError> {
    let mut buf = Vec::new();
    reader.take(u64::from(len)).read_to_end(&mut buf)?;
    if buf.len() != len as usize {
        return Err(ContainerError::Truncated);
    }
    Ok(buf)
}

fn read_string(reader: &mut impl Read, max: u32) -> Result<String, ContainerError> {
    let len = read_u32(reader)?;
    if len > max {
        return Err(ContainerError::LengthTooLarge {
            what: "string",
            len,
            max,
        });
    }
    String::from_utf8(read_bytes(reader, len)?).map_err(|_| ContainerError::InvalidString)
}
