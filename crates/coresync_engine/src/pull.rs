//! Pull: fetch every remote record and rebuild the local collection.
//!
//! A pull is a full replace, not a merge. The engine walks the listing to
//! the last page, derives the local field set, drops and recreates the
//! collection schema, then bulk-inserts the coerced records. The snapshot
//! generation is captured from the records exactly as the remote sent
//! them, which is what later change detection compares against.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use coresync_protocol::PullQuery;
use coresync_schema::{EntityType, FieldSchema, GEOMETRY_FALLBACK_FIELD, GEOMETRY_FIELD};
use coresync_store::LocalCollection;
use coresync_value::{fingerprint, Geometry, Record, Value};

use crate::engine::{record_id, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressSink;
use crate::remote::RemoteStore;

/// Outcome of one pull.
///
/// `added` and `updated` are relative to the previous snapshot
/// generation; records that arrived unchanged count toward `total` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullResult {
    /// Records whose id was not in the previous snapshot.
    pub added: usize,
    /// Records whose content hash changed since the previous snapshot.
    pub updated: usize,
    /// Records that could not be mapped and were left out.
    pub skipped: usize,
    /// Records received from the remote.
    pub total: usize,
}

impl<R: RemoteStore, C: LocalCollection> SyncEngine<R, C> {
    /// Pulls every record of `entity_name` into the local collection.
    ///
    /// The listing is fetched to the last page before anything is
    /// written, so a transport failure mid-listing leaves the collection
    /// untouched. A single malformed record is logged and skipped, never
    /// fatal.
    pub fn pull(
        &self,
        entity_name: &str,
        query: &PullQuery,
        progress: &ProgressSink,
    ) -> SyncResult<PullResult> {
        match self.pull_inner(entity_name, query, progress) {
            Ok(result) => {
                {
                    let mut stats = self.stats.write();
                    stats.pulls_completed += 1;
                    stats.records_pulled += result.total as u64;
                }
                Ok(result)
            }
            Err(err) => {
                self.note_error(&err);
                Err(err)
            }
        }
    }

    fn pull_inner(
        &self,
        entity_name: &str,
        query: &PullQuery,
        progress: &ProgressSink,
    ) -> SyncResult<PullResult> {
        let entity = self.entity(entity_name)?;
        if !entity.supports_pull() {
            return Err(SyncError::PullNotSupported(entity_name.to_string()));
        }

        progress.report(0, "listing remote records");
        let records = self.fetch_all(entity, query, progress)?;
        let total = records.len();
        tracing::debug!(entity = entity.name(), total, "listing complete");

        progress.report(55, "deriving fields");
        let excluded = self.registry.excluded_fields();
        let flattened: Vec<Record> = records
            .iter()
            .map(|record| flatten_composites(record, excluded))
            .collect();
        let fields = derive_fields(entity, &flattened);

        self.collection
            .recreate_schema(&fields, entity.geometry_kind())?;

        progress.report(60, "mapping records");
        let previous = self.snapshots.get(entity.name())?;
        let mut result = PullResult {
            total,
            ..PullResult::default()
        };
        let mut mapped = Vec::with_capacity(total);
        for (record, flat) in records.iter().zip(&flattened) {
            let Some(id) = record_id(record) else {
                tracing::warn!(entity = entity.name(), "skipping record without id");
                result.skipped += 1;
                continue;
            };
            let Some(attrs) = map_record(entity, &fields, flat, self.config.point_buffer) else {
                tracing::warn!(entity = entity.name(), id, "skipping unmappable record");
                result.skipped += 1;
                continue;
            };
            match previous.get(&id) {
                None => result.added += 1,
                Some(known) if *known != fingerprint(record, excluded)? => result.updated += 1,
                Some(_) => {}
            }
            mapped.push(attrs);
        }

        progress.report(85, "writing rows");
        let inserted = self.collection.batch_insert(mapped)?;

        self.snapshots.capture(entity.name(), &records, excluded)?;
        self.snapshots.set_last_sync(entity.name(), Utc::now())?;

        tracing::info!(
            entity = entity.name(),
            inserted,
            added = result.added,
            updated = result.updated,
            skipped = result.skipped,
            "pull complete"
        );
        progress.finish("pull complete");
        Ok(result)
    }

    /// Fetches every listing page, following page tokens to the end.
    fn fetch_all(
        &self,
        entity: &EntityType,
        query: &PullQuery,
        progress: &ProgressSink,
    ) -> SyncResult<Vec<Record>> {
        let query = match query.page_size() {
            Some(_) => query.clone(),
            None => query.clone().with_page_size(self.config.page_size),
        };
        let mut records = Vec::new();
        let mut token: Option<String> = None;
        let mut expected: Option<u64> = None;
        loop {
            let page = self.remote.list(entity, &query, token.as_deref())?;
            expected = page.total.or(expected);
            token = page.next_page_token;
            records.extend(page.records);
            if let Some(expected) = expected.filter(|count| *count > 0) {
                let fetched = (records.len() as u64).min(expected);
                progress.report((fetched * 50 / expected) as u8, "fetching");
            }
            if token.is_none() {
                break;
            }
        }
        Ok(records)
    }
}

/// Flattens map values of excluded composite fields into one
/// `{parent}_{subkey}` entry per sub-key.
///
/// Aggregates arrive as nested objects and are server-computed, so the
/// parent never takes part in hashing or pushing; locally its sub-keys
/// become ordinary flat columns. Map values outside the excluded set
/// stay whole and end up as JSON text through string coercion.
fn flatten_composites(record: &Record, excluded: &BTreeSet<String>) -> Record {
    let mut flat = Record::with_capacity(record.len());
    for (name, value) in record.iter() {
        match value {
            Value::Map(pairs) if excluded.contains(name) => {
                for (sub, sub_value) in pairs {
                    flat.set(format!("{name}_{sub}"), sub_value.clone());
                }
            }
            _ => flat.set(name, value.clone()),
        }
    }
    flat
}

/// Derives the local field set from the declared schema plus every
/// record in the listing.
///
/// Declared fields keep their declared definition. Dynamic fields are
/// typed from their first non-null value; a value over 255 characters
/// seen in any record lifts the corresponding string limit.
fn derive_fields(entity: &EntityType, records: &[Record]) -> Vec<FieldSchema> {
    let mut fields: Vec<FieldSchema> = entity.fields().to_vec();
    let mut slots: BTreeMap<String, usize> = BTreeMap::new();
    // Dynamic fields created from a null value, pending a real type.
    let mut untyped: BTreeSet<String> = BTreeSet::new();
    for (index, field) in fields.iter().enumerate() {
        slots.insert(field.name().to_string(), index);
    }
    let declared = fields.len();

    for record in records {
        for (name, value) in record.iter() {
            if is_geometry_carrier(entity, name) {
                continue;
            }
            match slots.get(name).copied() {
                None => {
                    if value.is_null() {
                        untyped.insert(name.to_string());
                    }
                    slots.insert(name.to_string(), fields.len());
                    fields.push(FieldSchema::inferred(name, value));
                }
                Some(slot) if slot >= declared => {
                    if !value.is_null() && untyped.remove(name) {
                        fields[slot] = FieldSchema::inferred(name, value);
                    } else if needs_widening(&fields[slot], value) {
                        fields[slot] = fields[slot].clone().with_length(0);
                    }
                }
                Some(_) => {}
            }
        }
    }
    fields
}

fn needs_widening(field: &FieldSchema, value: &Value) -> bool {
    use coresync_schema::FieldType;
    field.field_type() == FieldType::String
        && !field.is_unlimited()
        && matches!(value, Value::Str(s) if s.chars().count() > 255)
}

/// True for the field names reserved as geometry carriers.
fn is_geometry_carrier(entity: &EntityType, name: &str) -> bool {
    entity.has_geometry()
        && (name == GEOMETRY_FIELD || name == GEOMETRY_FALLBACK_FIELD)
        && entity.field(name).is_none()
}

/// Coerces one flattened record into local attributes.
///
/// Returns `None` when a required field cannot hold its value; an
/// optional field that does not fit just becomes null.
fn map_record(
    entity: &EntityType,
    fields: &[FieldSchema],
    record: &Record,
    point_buffer: f64,
) -> Option<Record> {
    let mut attrs = Record::with_capacity(fields.len() + 1);
    for field in fields {
        let value = match record.get(field.name()) {
            None => Value::Null,
            Some(raw) => match field.field_type().coerce(raw) {
                Some(coerced) => coerced,
                None if field.is_required() => return None,
                None => {
                    tracing::debug!(field = field.name(), "value does not fit, storing null");
                    Value::Null
                }
            },
        };
        attrs.set(field.name().to_string(), value);
    }
    if entity.has_geometry() {
        if let Some(geometry) = extract_geometry(entity, record, point_buffer) {
            attrs.set(GEOMETRY_FIELD.to_string(), Value::Geometry(geometry));
        }
    }
    Some(attrs)
}

/// Reads the record's geometry from the primary carrier field, falling
/// back to the alternate name some endpoints use.
///
/// When the local kind needs an area and the remote sent a point, the
/// point becomes a small square centered on it.
fn extract_geometry(entity: &EntityType, record: &Record, point_buffer: f64) -> Option<Geometry> {
    let raw = record
        .get(GEOMETRY_FIELD)
        .filter(|value| !value.is_null())
        .or_else(|| {
            record
                .get(GEOMETRY_FALLBACK_FIELD)
                .filter(|value| !value.is_null())
        })?;
    let geometry = match raw {
        Value::Geometry(geometry) => geometry.clone(),
        Value::Str(text) => Geometry::parse(text)?,
        _ => return None,
    };
    if entity.geometry_kind().requires_area() && geometry.kind() == "POINT" {
        if let Some(square) = geometry.to_square(point_buffer) {
            return Some(square);
        }
    }
    Some(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::remote::MockRemoteStore;
    use coresync_protocol::ListPage;
    use coresync_schema::{FieldType, GeometryKind, SchemaRegistry};
    use coresync_store::{MemoryCollection, RowId};

    fn first_row(engine: &SyncEngine<MockRemoteStore, MemoryCollection>) -> coresync_store::LocalRow {
        engine.collection().row(RowId::new(1)).unwrap()
    }

    fn sample_record(id: i64, name: &str, value: f64, collected: bool) -> Record {
        Record::from_pairs(vec![
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::from(name)),
            ("value".to_string(), Value::Float(value)),
            ("collected".to_string(), Value::Bool(collected)),
        ])
    }

    fn engine_with_pages(
        catalog: Vec<EntityType>,
        pages: Vec<ListPage>,
    ) -> SyncEngine<MockRemoteStore, MemoryCollection> {
        let registry = SchemaRegistry::new(catalog).unwrap();
        let remote = MockRemoteStore::new();
        remote.set_pages(pages);
        SyncEngine::new(registry, remote, MemoryCollection::new(), SyncConfig::new())
    }

    #[test]
    fn pull_walks_every_page() {
        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![
                ListPage::new(vec![sample_record(1, "A", 1.5, true)]).with_total(3),
                ListPage::new(vec![sample_record(2, "B", 2.0, false)]).with_total(3),
                ListPage::new(vec![sample_record(3, "C", 0.25, true)]).with_total(3),
            ],
        );

        let result = engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        assert_eq!(result.added, 3);
        assert_eq!(result.updated, 0);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.total, 3);
        assert_eq!(engine.collection().len(), 3);
        assert_eq!(engine.snapshots().get("Sample").unwrap().len(), 3);
        assert!(engine.snapshots().last_sync("Sample").unwrap().is_some());

        let stats = engine.stats();
        assert_eq!(stats.pulls_completed, 1);
        assert_eq!(stats.records_pulled, 3);
    }

    #[test]
    fn inference_types_flag_columns_as_boolean() {
        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![sample_record(1, "A", 1.5, true)])],
        );
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let fields = engine.collection().fields();
        let by_name = |name: &str| {
            fields
                .iter()
                .find(|f| f.name() == name)
                .unwrap()
                .field_type()
        };
        assert_eq!(by_name("id"), FieldType::Integer);
        assert_eq!(by_name("name"), FieldType::String);
        assert_eq!(by_name("value"), FieldType::Double);
        assert_eq!(by_name("collected"), FieldType::Boolean);
    }

    #[test]
    fn declared_fields_win_over_inference() {
        let entity = EntityType::new("Sample")
            .with_field(FieldSchema::new("value", FieldType::Double));
        let mut record = sample_record(1, "A", 0.0, true);
        record.set("value", Value::from("12"));

        let engine = engine_with_pages(vec![entity], vec![ListPage::new(vec![record])]);
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let row = first_row(&engine);
        assert_eq!(row.attributes.get("value"), Some(&Value::Float(12.0)));
    }

    #[test]
    fn long_value_in_any_record_lifts_the_limit() {
        let mut late = sample_record(2, "B", 1.0, true);
        late.set("note", Value::from("x".repeat(300)));
        let mut early = sample_record(1, "A", 1.0, true);
        early.set("note", Value::from("short"));

        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![early, late])],
        );
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let fields = engine.collection().fields();
        let note = fields.iter().find(|f| f.name() == "note").unwrap();
        assert!(note.is_unlimited());
    }

    #[test]
    fn null_first_sightings_take_the_next_real_type() {
        let mut first = sample_record(1, "A", 1.0, true);
        first.set("depth", Value::Null);
        let mut second = sample_record(2, "B", 1.0, true);
        second.set("depth", Value::Float(12.5));

        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![first, second])],
        );
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let fields = engine.collection().fields();
        let depth = fields.iter().find(|f| f.name() == "depth").unwrap();
        assert_eq!(depth.field_type(), FieldType::Double);
    }

    #[test]
    fn excluded_composites_flatten_into_columns() {
        let mut record = sample_record(1, "A", 1.0, true);
        record.set(
            "chemistry",
            Value::Map(vec![
                ("au".to_string(), Value::Float(1.5)),
                ("ag".to_string(), Value::Int(2)),
            ]),
        );

        let registry = SchemaRegistry::new(vec![EntityType::new("Sample")])
            .unwrap()
            .with_excluded_fields(["chemistry"]);
        let remote = MockRemoteStore::new();
        remote.set_pages(vec![ListPage::new(vec![record])]);
        let engine = SyncEngine::new(registry, remote, MemoryCollection::new(), SyncConfig::new());

        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let row = first_row(&engine);
        assert_eq!(row.attributes.get("chemistry_au"), Some(&Value::Float(1.5)));
        assert_eq!(row.attributes.get("chemistry_ag"), Some(&Value::Int(2)));
        assert!(row.attributes.get("chemistry").is_none());
    }

    #[test]
    fn plain_maps_become_json_text() {
        let mut record = sample_record(1, "A", 1.0, true);
        record.set(
            "extra",
            Value::Map(vec![("a".to_string(), Value::Int(1))]),
        );

        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![record])],
        );
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let row = first_row(&engine);
        assert_eq!(
            row.attributes.get("extra"),
            Some(&Value::Str(r#"{"a":1}"#.to_string()))
        );
    }

    #[test]
    fn records_without_id_are_skipped() {
        let stray = Record::from_pairs(vec![("name".to_string(), Value::from("stray"))]);
        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![sample_record(1, "A", 1.0, true), stray])],
        );

        let result = engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        assert_eq!(result.added, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(engine.collection().len(), 1);
    }

    #[test]
    fn second_pull_counts_changes_against_the_snapshot() {
        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![
                sample_record(1, "A", 1.0, true),
                sample_record(2, "B", 2.0, false),
            ])],
        );
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        // Record 2 changes on the server, record 3 appears.
        engine.remote.set_pages(vec![ListPage::new(vec![
            sample_record(1, "A", 1.0, true),
            sample_record(2, "B", 2.5, false),
            sample_record(3, "C", 3.0, true),
        ])]);

        let result = engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        assert_eq!(result.added, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.total, 3);
        assert_eq!(engine.collection().len(), 3);
    }

    #[test]
    fn point_becomes_square_when_kind_needs_area() {
        let mut record = sample_record(1, "A", 1.0, true);
        record.set("geometry", Value::from("SRID=4326;POINT(10 20)"));

        let engine = engine_with_pages(
            vec![EntityType::new("Pit").with_geometry(GeometryKind::Polygon)],
            vec![ListPage::new(vec![record])],
        );
        engine
            .pull("Pit", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let row = first_row(&engine);
        let geometry = row.geometry.as_ref().unwrap();
        assert_eq!(geometry.kind(), "POLYGON");
        assert!(row.attributes.get("geometry").is_none());
    }

    #[test]
    fn location_field_carries_geometry_when_primary_is_absent() {
        let mut record = sample_record(1, "A", 1.0, true);
        record.set("location", Value::from("POINT(3 4)"));

        let engine = engine_with_pages(
            vec![EntityType::new("Station").with_geometry(GeometryKind::Point)],
            vec![ListPage::new(vec![record])],
        );
        engine
            .pull("Station", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let row = first_row(&engine);
        let geometry = row.geometry.as_ref().unwrap();
        assert_eq!(geometry.kind(), "POINT");
        assert_eq!(geometry.point_coordinates(), Some((3.0, 4.0)));
    }

    #[test]
    fn pull_failure_leaves_collection_and_stats_clean() {
        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![
                ListPage::new(vec![sample_record(1, "A", 1.0, true)]),
                ListPage::new(vec![sample_record(2, "B", 2.0, false)]),
            ],
        );
        engine.remote.fail_list_at(1);

        let err = engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(engine.collection().len(), 0);
        let stats = engine.stats();
        assert_eq!(stats.pulls_completed, 0);
        assert!(stats.last_error.unwrap().contains("connection reset"));
    }

    #[test]
    fn push_only_entities_cannot_pull() {
        let engine = engine_with_pages(
            vec![EntityType::new("Upload").push_only()],
            vec![ListPage::new(vec![])],
        );
        let err = engine
            .pull("Upload", &PullQuery::new(), &ProgressSink::none())
            .unwrap_err();
        assert!(matches!(err, SyncError::PullNotSupported(_)));
    }

    #[test]
    fn progress_reaches_completion() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        let sink = ProgressSink::new(move |pct, _| inner.lock().unwrap().push(pct));

        let engine = engine_with_pages(
            vec![EntityType::new("Sample")],
            vec![ListPage::new(vec![sample_record(1, "A", 1.0, true)]).with_total(1)],
        );
        engine.pull("Sample", &PullQuery::new(), &sink).unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
    }
}
