use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use redlilium_persist::serialize::{FlatMap, Scalar};
use redlilium_persist::{
    ContainerError, Entity, FailureReason, LoadReport, Member, MemberRef, Persist, PersistConfig,
    PersistError, Persistence, TemplateCatalog, World,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Fixture types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Persist)]
struct Item {
    s: String,
    a: i32,
}

#[derive(Debug, Default, Persist)]
struct Sample {
    i: i32,
    s: String,
    list: Vec<Item>,
    tag: Option<String>,
}

impl Member for Sample {}

#[derive(Debug, Default, Persist)]
struct Health {
    current: i32,
    max: i32,
}

impl Member for Health {}

#[derive(Debug, Default, Persist)]
struct Follower {
    target: Option<MemberRef<Health>>,
    leader: Option<Entity>,
}

impl Member for Follower {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Persist)]
enum Faction {
    #[default]
    Neutral,
    Ally,
    Enemy = 10,
}

#[derive(Debug, Default, Persist)]
struct Inventory {
    items: Vec<Item>,
    counts: HashMap<String, i32>,
    empty: Vec<Item>,
    grid: [u8; 3],
    queue: VecDeque<u32>,
    faction: Faction,
}

impl Member for Inventory {}

fn catalog() -> TemplateCatalog {
    let mut templates = TemplateCatalog::new();
    templates.register("sample", || {
        vec![Box::new(Sample {
            tag: Some("fresh".into()),
            ..Default::default()
        }) as Box<dyn Member>]
    });
    templates.register("target", || {
        vec![Box::new(Health { current: 1, max: 1 }) as Box<dyn Member>]
    });
    templates.register("follower", || {
        vec![Box::new(Follower::default()) as Box<dyn Member>]
    });
    templates.register("inventory", || {
        vec![Box::new(Inventory {
            empty: vec![Item::default()],
            ..Default::default()
        }) as Box<dyn Member>]
    });
    templates
}

fn persistence() -> Persistence {
    Persistence::new(catalog())
}

fn save_bytes(persistence: &Persistence, world: &mut World) -> Vec<u8> {
    let mut bytes = Vec::new();
    persistence.save(world, &mut bytes).unwrap();
    bytes
}

fn load_bytes(persistence: &Persistence, bytes: &[u8]) -> (World, LoadReport) {
    let mut world = World::new();
    let report = persistence.load(&mut world, bytes).unwrap();
    (world, report)
}

fn spawn_sample(persistence: &Persistence, world: &mut World, name: &str) -> Entity {
    persistence.templates().spawn(world, "sample", name).unwrap()
}

fn sample(world: &World, entity: Entity) -> &Sample {
    let r = world.find_member::<Sample>(entity).unwrap();
    world.member(r).unwrap()
}

/// Byte range of each payload block in a container.
fn block_payload_ranges(bytes: &[u8]) -> Vec<Range<usize>> {
    let read_u32 = |pos: &mut usize| {
        let value = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
        *pos += 4;
        value as usize
    };
    let mut pos = 4;
    let count = read_u32(&mut pos);
    for _ in 0..count * 3 {
        let len = read_u32(&mut pos);
        pos += len;
    }
    let mut ranges = Vec::new();
    for _ in 0..count {
        let id_len = read_u32(&mut pos);
        pos += id_len;
        let len = read_u32(&mut pos);
        ranges.push(pos..pos + len);
        pos += len;
    }
    ranges
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn concrete_scenario_roundtrip() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    let entity = spawn_sample(&persistence, &mut world, "scenario");
    let r = world.find_member::<Sample>(entity).unwrap();
    {
        let sample = world.member_mut(r).unwrap();
        sample.i = 42;
        sample.s = "hello".into();
        sample.list = vec![
            Item { s: "a".into(), a: 1 },
            Item { s: "b".into(), a: 2 },
        ];
        sample.tag = None;
    }

    let bytes = save_bytes(&persistence, &mut world);
    let (loaded, report) = load_bytes(&persistence, &bytes);

    assert!(report.failures.is_empty());
    assert_eq!(report.loaded.len(), 1);
    let restored = sample(&loaded, report.loaded[0]);
    assert_eq!(restored.i, 42);
    assert_eq!(restored.s, "hello");
    assert_eq!(restored.list.len(), 2);
    assert_eq!(restored.list[1].a, 2);
    // Template default is Some("fresh"); the saved null wins.
    assert_eq!(restored.tag, None);
    assert_eq!(loaded.name(report.loaded[0]), Some("scenario"));
    assert_eq!(loaded.template(report.loaded[0]), Some("sample"));
}

#[test]
fn identity_preserved_across_resave() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    let a = spawn_sample(&persistence, &mut world, "a");
    let b = spawn_sample(&persistence, &mut world, "b");
    let ids = [
        world.identity(a).unwrap().to_string(),
        world.identity(b).unwrap().to_string(),
    ];

    let first = save_bytes(&persistence, &mut world);
    let (mut loaded, report) = load_bytes(&persistence, &first);
    let loaded_ids: Vec<_> = report
        .loaded
        .iter()
        .map(|e| loaded.identity(*e).unwrap().to_string())
        .collect();
    assert_eq!(loaded_ids, ids);

    let second = save_bytes(&persistence, &mut loaded);
    assert_eq!(first, second);
}

#[test]
fn entities_spawned_outside_load_get_distinct_identities() {
    let persistence = persistence();
    let mut world = World::new();
    let a = spawn_sample(&persistence, &mut world, "a");
    let b = spawn_sample(&persistence, &mut world, "b");
    let id_a = world.identity(a).unwrap();
    assert_eq!(id_a.len(), 36);
    assert_ne!(Some(id_a), world.identity(b));
}

#[test]
fn reference_topology_survives_roundtrip() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();

    // Follower comes first in the file, so its target is a forward reference.
    let follower = persistence.templates().spawn(&mut world, "follower", "f").unwrap();
    let target = persistence.templates().spawn(&mut world, "target", "t").unwrap();
    let health = world.find_member::<Health>(target).unwrap();
    world.member_mut(health).unwrap().max = 77;
    let fr = world.find_member::<Follower>(follower).unwrap();
    {
        let f = world.member_mut(fr).unwrap();
        f.target = Some(health);
        f.leader = Some(target);
    }

    let bytes = save_bytes(&persistence, &mut world);
    let (loaded, report) = load_bytes(&persistence, &bytes);
    assert_eq!(report.loaded.len(), 2);

    let new_target = loaded
        .entity_by_identity(world.identity(target).unwrap())
        .unwrap();
    let new_follower = loaded
        .entity_by_identity(world.identity(follower).unwrap())
        .unwrap();
    let f = loaded
        .member(loaded.find_member::<Follower>(new_follower).unwrap())
        .unwrap();
    let target_ref = f.target.unwrap();
    assert_eq!(target_ref.entity(), new_target);
    assert_eq!(target_ref.index(), 0);
    assert_eq!(loaded.member(target_ref).unwrap().max, 77);
    assert_eq!(f.leader, Some(new_target));
}

#[test]
fn reference_to_absent_entity_decodes_to_default() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    let follower = persistence.templates().spawn(&mut world, "follower", "f").unwrap();
    let target = persistence.templates().spawn(&mut world, "target", "t").unwrap();
    let health = world.find_member::<Health>(target).unwrap();
    let fr = world.find_member::<Follower>(follower).unwrap();
    world.member_mut(fr).unwrap().target = Some(health);
    let bytes = save_bytes(&persistence, &mut world);

    // The loader cannot rebuild the target, so the reference has nothing to resolve to.
    let mut templates = TemplateCatalog::new();
    templates.register("follower", || {
        vec![Box::new(Follower::default()) as Box<dyn Member>]
    });
    let loader = Persistence::new(templates);
    let (loaded, report) = load_bytes(&loader, &bytes);

    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].reason,
        FailureReason::UnknownTemplate(ref id) if id == "target"
    ));
    let f = loaded
        .member(loaded.find_member::<Follower>(report.loaded[0]).unwrap())
        .unwrap();
    assert!(f.target.is_none());
}

#[test]
fn reference_to_despawned_entity_is_saved_as_null() {
    let persistence = persistence();
    let mut world = World::new();
    let follower = persistence.templates().spawn(&mut world, "follower", "f").unwrap();
    let target = persistence.templates().spawn(&mut world, "target", "t").unwrap();
    let health = world.find_member::<Health>(target).unwrap();
    let fr = world.find_member::<Follower>(follower).unwrap();
    world.member_mut(fr).unwrap().target = Some(health);
    world.despawn(target);

    let bytes = save_bytes(&persistence, &mut world);
    let (loaded, report) = load_bytes(&persistence, &bytes);
    let f = loaded
        .member(loaded.find_member::<Follower>(report.loaded[0]).unwrap())
        .unwrap();
    assert!(f.target.is_none());
}

#[test]
fn collections_roundtrip() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    let entity = persistence.templates().spawn(&mut world, "inventory", "bag").unwrap();
    let r = world.find_member::<Inventory>(entity).unwrap();
    let items = vec![
        Item { s: "x".into(), a: 1 },
        Item { s: "y".into(), a: 2 },
        Item { s: "z".into(), a: 3 },
    ];
    let counts = HashMap::from([("gold".to_string(), 10), ("gems".to_string(), 2)]);
    {
        let inv = world.member_mut(r).unwrap();
        inv.items = items.clone();
        inv.counts = counts.clone();
        inv.empty.clear();
        inv.grid = [7, 8, 9];
        inv.queue = VecDeque::from([3, 1]);
        inv.faction = Faction::Enemy;
    }

    let bytes = save_bytes(&persistence, &mut world);
    let (loaded, report) = load_bytes(&persistence, &bytes);
    let inv = loaded
        .member(loaded.find_member::<Inventory>(report.loaded[0]).unwrap())
        .unwrap();
    assert_eq!(inv.items, items);
    assert_eq!(inv.counts, counts);
    assert!(inv.empty.is_empty());
    assert_eq!(inv.grid, [7, 8, 9]);
    assert_eq!(inv.queue, VecDeque::from([3, 1]));
    assert_eq!(inv.faction, Faction::Enemy);
}

// ---------------------------------------------------------------------------
// Schema drift
// ---------------------------------------------------------------------------

mod v1 {
    use redlilium_persist::{Member, Persist};

    #[derive(Debug, Default, Persist)]
    pub struct Stats {
        pub hp: i32,
        pub name: String,
        pub legacy: Vec<i32>,
    }

    impl Member for Stats {}
}

mod v2 {
    use redlilium_persist::{Member, Persist, PersistError, ReadAdapter};

    #[derive(Debug, Default, Persist)]
    pub struct Stats {
        pub name: String,
        pub mana: i32,
        pub health: i32,
        #[persist(skip)]
        pub missing: Vec<String>,
    }

    impl Member for Stats {
        fn on_missing_property(
            &mut self,
            name: &str,
            reader: &mut ReadAdapter<'_, '_, '_>,
        ) -> Result<(), PersistError> {
            self.missing.push(name.to_owned());
            if name == "hp" {
                self.health = reader.read("hp", 0)?;
            }
            Ok(())
        }
    }
}

#[test]
fn schema_growth_and_removal() {
    init_logger();
    let mut old_templates = TemplateCatalog::new();
    old_templates.register("stats", || vec![Box::new(v1::Stats::default()) as Box<dyn Member>]);
    let saver = Persistence::new(old_templates);

    let mut world = World::new();
    let entity = saver.templates().spawn(&mut world, "stats", "s").unwrap();
    let r = world.find_member::<v1::Stats>(entity).unwrap();
    {
        let stats = world.member_mut(r).unwrap();
        stats.hp = 12;
        stats.name = "knight".into();
        stats.legacy = vec![1, 2, 3];
    }
    let bytes = save_bytes(&saver, &mut world);

    let mut new_templates = TemplateCatalog::new();
    new_templates.register("stats", || {
        vec![Box::new(v2::Stats {
            mana: 5,
            ..Default::default()
        }) as Box<dyn Member>]
    });
    let loader = Persistence::new(new_templates);
    let (loaded, report) = load_bytes(&loader, &bytes);

    let stats = loaded
        .member(loaded.find_member::<v2::Stats>(report.loaded[0]).unwrap())
        .unwrap();
    assert_eq!(stats.name, "knight");
    assert_eq!(stats.mana, 5);
    assert_eq!(stats.missing, vec!["hp".to_string(), "legacy".to_string()]);
    assert_eq!(stats.health, 12);
}

// ---------------------------------------------------------------------------
// Fault containment
// ---------------------------------------------------------------------------

#[test]
fn corrupt_block_only_drops_its_entity() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    for i in 0..5 {
        let e = spawn_sample(&persistence, &mut world, &format!("e{i}"));
        let r = world.find_member::<Sample>(e).unwrap();
        world.member_mut(r).unwrap().i = i;
    }
    let mut bytes = save_bytes(&persistence, &mut world);

    let ranges = block_payload_ranges(&bytes);
    assert_eq!(ranges.len(), 5);
    for byte in &mut bytes[ranges[2].clone()] {
        *byte = 0xff;
    }

    let (loaded, report) = load_bytes(&persistence, &bytes);
    assert_eq!(report.loaded.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].reason, FailureReason::Payload(_)));
    assert_eq!(loaded.entity_count(), 4);

    let names: Vec<_> = report
        .loaded
        .iter()
        .map(|e| loaded.name(*e).unwrap().to_string())
        .collect();
    assert_eq!(names, ["e0", "e1", "e3", "e4"]);
    let values: Vec<_> = report.loaded.iter().map(|e| sample(&loaded, *e).i).collect();
    assert_eq!(values, [0, 1, 3, 4]);
}

/// Replaces one payload block, fixing up its length prefix.
fn replace_block(bytes: &[u8], block: Range<usize>, payload: &[u8]) -> Vec<u8> {
    let prefix = block.start - 4;
    let mut out = bytes[..prefix].to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&bytes[block.end..]);
    out
}

#[test]
fn oversized_collection_count_only_drops_its_entity() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    for name in ["a", "b", "c"] {
        spawn_sample(&persistence, &mut world, name);
    }
    let bytes = save_bytes(&persistence, &mut world);

    let format = persistence.config().payload_format;
    let ranges = block_payload_ranges(&bytes);
    let mut payload = FlatMap::from_payload(&bytes[ranges[1].clone()], format).unwrap();
    payload.insert("Sample.0.list.Count", Scalar::Int(i64::MAX));
    let bytes = replace_block(&bytes, ranges[1].clone(), &payload.to_payload(format).unwrap());

    let (loaded, report) = load_bytes(&persistence, &bytes);
    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].reason,
        FailureReason::Payload(PersistError::MalformedPayload(_))
    ));
    let names: Vec<_> = report
        .loaded
        .iter()
        .map(|e| loaded.name(*e).unwrap().to_string())
        .collect();
    assert_eq!(names, ["a", "c"]);
    assert_eq!(loaded.entity_count(), 2);
}

#[derive(Debug, Default, Persist)]
struct Settled {
    value: i32,
    #[persist(skip)]
    settled: bool,
}

impl Member for Settled {
    fn on_all_entities_loaded(&mut self) {
        self.settled = true;
    }
}

#[test]
fn truncation_mid_blocks_keeps_decoded_entities() {
    init_logger();
    let mut templates = TemplateCatalog::new();
    templates.register("settled", || vec![Box::new(Settled::default()) as Box<dyn Member>]);
    let persistence = Persistence::new(templates);

    let mut world = World::new();
    let mut identities = Vec::new();
    for (value, name) in [(1, "a"), (2, "b"), (3, "c")] {
        let e = persistence.templates().spawn(&mut world, "settled", name).unwrap();
        let r = world.find_member::<Settled>(e).unwrap();
        world.member_mut(r).unwrap().value = value;
        identities.push(world.identity(e).unwrap().to_string());
    }
    let bytes = save_bytes(&persistence, &mut world);
    let ranges = block_payload_ranges(&bytes);
    let cut = &bytes[..ranges[2].start + 1];

    let mut target = World::new();
    let err = persistence.load(&mut target, cut).unwrap_err();
    assert!(matches!(err, ContainerError::Truncated));
    assert!(!target.is_loading());

    let survivors: Vec<Entity> = target.iter_entities().collect();
    assert_eq!(survivors.len(), 2);
    let mut seen = Vec::new();
    for e in survivors {
        let settled = target
            .member(target.find_member::<Settled>(e).unwrap())
            .unwrap();
        assert!(!settled.settled);
        seen.push((target.name(e).unwrap().to_string(), settled.value));
    }
    seen.sort();
    assert_eq!(seen, [("a".to_string(), 1), ("b".to_string(), 2)]);
    assert!(target.entity_by_identity(&identities[0]).is_some());
    assert!(target.entity_by_identity(&identities[2]).is_none());
}

#[test]
fn bad_magic_aborts_load() {
    let persistence = persistence();
    let mut world = World::new();
    spawn_sample(&persistence, &mut world, "a");
    let mut bytes = save_bytes(&persistence, &mut world);
    bytes[0] ^= 0xff;

    let mut target = World::new();
    let err = persistence.load(&mut target, bytes.as_slice()).unwrap_err();
    assert!(matches!(err, ContainerError::BadMagic { .. }));
    assert!(!target.is_loading());
    assert_eq!(target.entity_count(), 0);
}

#[test]
fn duplicate_identity_in_directory_keeps_first() {
    init_logger();
    let persistence = persistence();
    let mut world = World::new();
    spawn_sample(&persistence, &mut world, "a");
    let bytes = save_bytes(&persistence, &mut world);

    // Loading the same file twice into one world collides on every identity.
    let mut target = World::new();
    persistence.load(&mut target, bytes.as_slice()).unwrap();
    let report = persistence.load(&mut target, bytes.as_slice()).unwrap();
    assert!(report.loaded.is_empty());
    assert!(matches!(report.failures[0].reason, FailureReason::IdentityConflict));
    assert_eq!(target.entity_count(), 1);
}

// ---------------------------------------------------------------------------
// Custom serializers
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Persist)]
struct Shape {
    sides: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Persist)]
#[persist(base = Shape)]
struct Triangle {
    sides: u32,
    color: String,
}

#[derive(Debug, Default, Persist)]
struct Drawing {
    shape: Triangle,
}

impl Member for Drawing {}

#[test]
fn custom_serializer_applies_to_derived_type() {
    init_logger();
    let mut templates = TemplateCatalog::new();
    templates.register("drawing", || vec![Box::new(Drawing::default()) as Box<dyn Member>]);
    let mut persistence = Persistence::new(templates);
    let writes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&writes);
    persistence.serializers_mut().register_record::<Shape, _, _>(
        move |shape, w| {
            counter.fetch_add(1, Ordering::SeqCst);
            w.add("packed", &(shape.sides * 100))
        },
        |r, shape| {
            let packed: u32 = r.read("packed", shape.sides * 100)?;
            Ok(Shape {
                sides: packed / 100,
            })
        },
    );

    let mut world = World::new();
    let e = persistence.templates().spawn(&mut world, "drawing", "d").unwrap();
    let r = world.find_member::<Drawing>(e).unwrap();
    world.member_mut(r).unwrap().shape = Triangle {
        sides: 3,
        color: "red".into(),
    };

    let bytes = save_bytes(&persistence, &mut world);
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    let (loaded, report) = load_bytes(&persistence, &bytes);
    let drawing = loaded
        .member(loaded.find_member::<Drawing>(report.loaded[0]).unwrap())
        .unwrap();
    assert_eq!(drawing.shape.sides, 3);
    // The base serializer does not know `color`, so it keeps its default.
    assert_eq!(drawing.shape.color, "");
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

static ALL_LOADED: Mutex<Vec<String>> = Mutex::new(Vec::new());

#[derive(Debug, Default, Persist)]
struct Probe {
    label: String,
    saves: u32,
    #[persist(skip)]
    complete: bool,
}

impl Member for Probe {
    fn on_before_save(&mut self) {
        self.saves += 1;
    }

    fn on_entity_load_complete(&mut self) {
        self.complete = true;
    }

    fn on_all_entities_loaded(&mut self) {
        assert!(self.complete);
        ALL_LOADED.lock().unwrap().push(self.label.clone());
    }
}

#[test]
fn lifecycle_callbacks_fire_in_order() {
    init_logger();
    let mut templates = TemplateCatalog::new();
    templates.register("probe", || vec![Box::new(Probe::default()) as Box<dyn Member>]);
    let persistence = Persistence::new(templates);

    let mut world = World::new();
    for label in ["first", "second", "third"] {
        let e = persistence.templates().spawn(&mut world, "probe", label).unwrap();
        let r = world.find_member::<Probe>(e).unwrap();
        world.member_mut(r).unwrap().label = label.into();
    }
    let bytes = save_bytes(&persistence, &mut world);
    let (loaded, report) = load_bytes(&persistence, &bytes);

    assert_eq!(*ALL_LOADED.lock().unwrap(), ["first", "second", "third"]);
    for e in &report.loaded {
        let probe = loaded
            .member(loaded.find_member::<Probe>(*e).unwrap())
            .unwrap();
        assert_eq!(probe.saves, 1);
        assert!(probe.complete);
    }
}

// ---------------------------------------------------------------------------
// Files and config
// ---------------------------------------------------------------------------

#[test]
fn file_roundtrip_with_ron_payloads() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("persist.toml");
    std::fs::write(&config_path, "payload_format = \"ron\"\n").unwrap();
    let config = PersistConfig::load(&config_path).unwrap();

    let persistence = Persistence::new(catalog()).with_config(config);
    let mut world = World::new();
    let e = spawn_sample(&persistence, &mut world, "on-disk");
    let r = world.find_member::<Sample>(e).unwrap();
    world.member_mut(r).unwrap().s = "saved".into();

    let save_path = dir.path().join("world.rlp");
    let saved = persistence.save_to_path(&mut world, &save_path).unwrap();
    assert_eq!(saved.written, 1);

    // RON payloads keep key paths readable in the file.
    let raw = std::fs::read(&save_path).unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.contains("Sample.0.s"));

    let mut loaded = World::new();
    let report = persistence.load_from_path(&mut loaded, &save_path).unwrap();
    assert_eq!(sample(&loaded, report.loaded[0]).s, "saved");
}

#[test]
fn format_mismatch_is_a_per_entity_failure() {
    init_logger();
    let writer = Persistence::new(catalog()).with_config(PersistConfig {
        payload_format: redlilium_persist::Format::Ron,
        ..PersistConfig::default()
    });
    let reader = persistence();
    let mut world = World::new();
    spawn_sample(&writer, &mut world, "a");
    let bytes = save_bytes(&writer, &mut world);

    let (loaded, report) = load_bytes(&reader, &bytes);
    assert!(report.loaded.is_empty());
    assert!(matches!(
        report.failures[0].reason,
        FailureReason::Payload(PersistError::FormatError(_))
    ));
    assert_eq!(loaded.entity_count(), 0);
}

#[test]
fn missing_file_is_io_error() {
    let persistence = persistence();
    let mut world = World::new();
    let err = persistence
        .load_from_path(&mut world, "/nonexistent/world.rlp")
        .unwrap_err();
    assert!(matches!(err, ContainerError::Io(_)));
}
