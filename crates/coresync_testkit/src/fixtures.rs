//! Catalog fixtures, record builders and the sync test harness.

use std::ops::Deref;
use std::sync::Arc;

use coresync_engine::{ProgressSink, PullResult, SyncConfig, SyncEngine};
use coresync_protocol::PullQuery;
use coresync_schema::{EntityType, FieldSchema, FieldType, GeometryKind, SchemaRegistry};
use coresync_store::MemoryCollection;
use coresync_value::{Geometry, Record, Value};

use crate::remote::MemoryRemote;

/// Plain entity type with declared fields and a natural key on `name`.
#[must_use]
pub fn sample_type() -> EntityType {
    EntityType::new("Sample")
        .with_fields(vec![
            FieldSchema::new("name", FieldType::String),
            FieldSchema::new("value", FieldType::Double),
            FieldSchema::new("collected", FieldType::Boolean),
        ])
        .with_natural_key(["name"])
}

/// Point-geometry entity type keyed on `name`.
#[must_use]
pub fn drill_hole_type() -> EntityType {
    EntityType::new("DrillHole")
        .with_fields(vec![
            FieldSchema::new("name", FieldType::String),
            FieldSchema::new("depth", FieldType::Double),
        ])
        .with_geometry(GeometryKind::Point)
        .with_natural_key(["name"])
}

/// Polygon-geometry entity type; point payloads get buffered to squares.
#[must_use]
pub fn zone_type() -> EntityType {
    EntityType::new("Zone")
        .with_field(FieldSchema::new("name", FieldType::String))
        .with_geometry(GeometryKind::Polygon)
        .with_natural_key(["name"])
}

/// The standard three-type catalog used across the test suites.
#[must_use]
pub fn sample_catalog() -> Vec<EntityType> {
    vec![sample_type(), drill_hole_type(), zone_type()]
}

/// Registry over [`sample_catalog`].
#[must_use]
pub fn sample_registry() -> SchemaRegistry {
    SchemaRegistry::new(sample_catalog()).expect("catalog fixture is valid")
}

/// A `Sample` record without a server id; `collected` defaults to true.
#[must_use]
pub fn sample_record(name: &str, value: f64) -> Record {
    Record::from_pairs(vec![
        ("name".to_string(), Value::from(name)),
        ("value".to_string(), Value::Float(value)),
        ("collected".to_string(), Value::Bool(true)),
    ])
}

/// A `Sample` record carrying a server id.
#[must_use]
pub fn sample_record_with_id(id: i64, name: &str, value: f64) -> Record {
    let mut record = sample_record(name, value);
    record.set("id", Value::Int(id));
    record
}

/// A `DrillHole` record with point geometry rendered as EWKT text, the
/// way a remote listing carries it.
#[must_use]
pub fn drill_hole_record(name: &str, x: f64, y: f64) -> Record {
    Record::from_pairs(vec![
        ("name".to_string(), Value::from(name)),
        ("depth".to_string(), Value::Float(120.0)),
        (
            "geometry".to_string(),
            Value::Str(Geometry::point(x, y, Some(4326)).ewkt()),
        ),
    ])
}

/// An engine wired to a [`MemoryRemote`] and a [`MemoryCollection`],
/// with handles kept on both so tests can seed and inspect them.
///
/// Dereferences to the engine, so sync verbs read naturally:
///
/// ```rust,ignore
/// let harness = SyncHarness::new();
/// harness.seed("Sample", vec![sample_record("A", 1.0)]);
/// harness.pull_all("Sample");
/// assert!(harness.detect_changes("Sample").unwrap().is_empty());
/// ```
pub struct SyncHarness {
    /// The engine under test.
    pub engine: SyncEngine<MemoryRemote, MemoryCollection>,
    remote: Arc<MemoryRemote>,
    collection: Arc<MemoryCollection>,
}

impl SyncHarness {
    /// Harness over [`sample_catalog`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(sample_catalog())
    }

    /// Harness over a custom catalog.
    #[must_use]
    pub fn with_catalog(catalog: Vec<EntityType>) -> Self {
        let registry = SchemaRegistry::new(catalog).expect("catalog fixture is valid");
        let remote = Arc::new(MemoryRemote::new());
        let collection = Arc::new(MemoryCollection::new());
        let engine = SyncEngine::from_shared(
            Arc::new(registry),
            Arc::clone(&remote),
            Arc::clone(&collection),
            SyncConfig::new(),
        );
        SyncHarness {
            engine,
            remote,
            collection,
        }
    }

    /// The fake remote, for seeding and assertions.
    #[must_use]
    pub fn remote(&self) -> &MemoryRemote {
        &self.remote
    }

    /// The local collection, for direct edits and assertions.
    #[must_use]
    pub fn collection(&self) -> &MemoryCollection {
        &self.collection
    }

    /// Seeds the remote table for `entity_name`, assigning missing ids.
    pub fn seed(&self, entity_name: &str, records: Vec<Record>) -> Vec<i64> {
        let entity = self.entity(entity_name);
        self.remote.seed(&entity, records)
    }

    /// Pulls every record of `entity_name` with no filters, panicking on
    /// failure. Tests that expect failure call the engine directly.
    pub fn pull_all(&self, entity_name: &str) -> PullResult {
        self.engine
            .pull(entity_name, &PullQuery::new(), &ProgressSink::none())
            .expect("fixture pull succeeds")
    }

    fn entity(&self, name: &str) -> EntityType {
        self.engine
            .registry()
            .get(name)
            .expect("entity type exists in the fixture catalog")
            .clone()
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SyncHarness {
    type Target = SyncEngine<MemoryRemote, MemoryCollection>;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test against a fresh harness.
pub fn with_harness<F, R>(f: F) -> R
where
    F: FnOnce(&SyncHarness) -> R,
{
    let harness = SyncHarness::new();
    f(&harness)
}

/// Pre-built sync situations.
pub mod scenarios {
    use super::*;

    /// A harness whose remote holds `count` `Sample` records and whose
    /// collection has already pulled them. Detection over the result
    /// reports nothing changed.
    #[must_use]
    pub fn pulled_samples(count: usize) -> SyncHarness {
        let harness = SyncHarness::new();
        let records = (0..count)
            .map(|i| sample_record(&format!("sample {i}"), i as f64 + 0.5))
            .collect();
        harness.seed("Sample", records);
        harness.pull_all("Sample");
        harness
    }
}
