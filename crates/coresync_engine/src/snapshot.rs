//! Content-hash snapshots of the last synchronized remote state.
//!
//! After every pull the engine fingerprints each record exactly as the
//! remote sent it and persists the `id -> hash` map in the collection's
//! metadata channel. Change detection later compares a row's current
//! fingerprint against this map; the hash is the only equality test, no
//! per-field diffing happens anywhere.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;

use coresync_store::LocalCollection;
use coresync_value::{fingerprint, Record};

use crate::engine::record_id;
use crate::error::{SyncError, SyncResult};

/// Map from remote id to content hash, one generation per entity type.
pub type SnapshotMap = BTreeMap<i64, String>;

/// Persists and caches snapshot generations in collection metadata.
///
/// Snapshots live under the key `{entity}_snapshot`, the matching pull or
/// push timestamp under `{entity}_last_sync`. Both survive a schema
/// recreate, so detection keeps working across repeated pulls.
pub struct SnapshotStore<C: LocalCollection> {
    collection: Arc<C>,
    cache: RwLock<HashMap<String, SnapshotMap>>,
}

impl<C: LocalCollection> SnapshotStore<C> {
    /// Creates a store over `collection`'s metadata channel.
    #[must_use]
    pub fn new(collection: Arc<C>) -> Self {
        SnapshotStore {
            collection,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the snapshot for `entity`, loading it on first access.
    ///
    /// A missing snapshot is an empty map (every record will look new);
    /// a present but undecodable one is an error, because treating it as
    /// empty would silently re-push every record and hide the damage.
    pub fn get(&self, entity: &str) -> SyncResult<SnapshotMap> {
        if let Some(map) = self.cache.read().get(entity) {
            return Ok(map.clone());
        }
        let map = match self.collection.get_meta(&snapshot_key(entity))? {
            Some(text) => decode_snapshot(entity, &text)?,
            None => SnapshotMap::new(),
        };
        self.cache
            .write()
            .insert(entity.to_string(), map.clone());
        Ok(map)
    }

    /// Fingerprints `records` as received and stores them as the new
    /// generation, replacing the previous one whole.
    ///
    /// Records without a usable id cannot be looked up later and are
    /// left out. The map is persisted before the cache is swapped, so a
    /// failed write leaves the old generation in effect.
    pub fn capture(
        &self,
        entity: &str,
        records: &[Record],
        excluded: &BTreeSet<String>,
    ) -> SyncResult<usize> {
        let mut map = SnapshotMap::new();
        for record in records {
            let Some(id) = record_id(record) else {
                continue;
            };
            map.insert(id, fingerprint(record, excluded)?);
        }
        let text = serde_json::to_string(&map)
            .map_err(|err| SyncError::snapshot_corrupt(entity, err.to_string()))?;
        self.collection.put_meta(&snapshot_key(entity), &text)?;
        let count = map.len();
        self.cache.write().insert(entity.to_string(), map);
        Ok(count)
    }

    /// Returns the last successful sync time, if one was recorded.
    pub fn last_sync(&self, entity: &str) -> SyncResult<Option<DateTime<Utc>>> {
        let Some(text) = self.collection.get_meta(&last_sync_key(entity))? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&text) {
            Ok(when) => Ok(Some(when.with_timezone(&Utc))),
            Err(err) => {
                tracing::warn!(entity, value = %text, %err, "ignoring unreadable last_sync");
                Ok(None)
            }
        }
    }

    /// Records `when` as the last successful sync time.
    pub fn set_last_sync(&self, entity: &str, when: DateTime<Utc>) -> SyncResult<()> {
        let text = when.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.collection.put_meta(&last_sync_key(entity), &text)?;
        Ok(())
    }
}

fn snapshot_key(entity: &str) -> String {
    format!("{entity}_snapshot")
}

fn last_sync_key(entity: &str) -> String {
    format!("{entity}_last_sync")
}

fn decode_snapshot(entity: &str, text: &str) -> SyncResult<SnapshotMap> {
    serde_json::from_str::<SnapshotMap>(text)
        .map_err(|err| SyncError::snapshot_corrupt(entity, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coresync_schema::GeometryKind;
    use coresync_store::MemoryCollection;
    use coresync_value::Value;

    fn record(id: i64, name: &str) -> Record {
        Record::from_pairs(vec![
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::from(name)),
        ])
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let store = SnapshotStore::new(Arc::new(MemoryCollection::new()));
        assert!(store.get("Sample").unwrap().is_empty());
    }

    #[test]
    fn capture_then_get() {
        let store = SnapshotStore::new(Arc::new(MemoryCollection::new()));
        let records = vec![record(1, "A"), record(2, "B")];
        let excluded = BTreeSet::new();

        let stored = store.capture("Sample", &records, &excluded).unwrap();
        assert_eq!(stored, 2);

        let map = store.get("Sample").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&1),
            Some(&fingerprint(&records[0], &excluded).unwrap())
        );
    }

    #[test]
    fn records_without_id_are_left_out() {
        let store = SnapshotStore::new(Arc::new(MemoryCollection::new()));
        let records = vec![
            record(1, "A"),
            Record::from_pairs(vec![("name".to_string(), Value::from("stray"))]),
        ];

        let stored = store.capture("Sample", &records, &BTreeSet::new()).unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn snapshot_survives_schema_recreate() {
        let collection = Arc::new(MemoryCollection::new());
        let store = SnapshotStore::new(Arc::clone(&collection));
        store
            .capture("Sample", &[record(1, "A")], &BTreeSet::new())
            .unwrap();

        collection.recreate_schema(&[], GeometryKind::None).unwrap();

        let fresh = SnapshotStore::new(collection);
        assert_eq!(fresh.get("Sample").unwrap().len(), 1);
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let collection = Arc::new(MemoryCollection::new());
        collection.put_meta("Sample_snapshot", "not json").unwrap();

        let store = SnapshotStore::new(collection);
        let err = store.get("Sample").unwrap_err();
        assert!(matches!(err, SyncError::SnapshotCorrupt { .. }));
    }

    #[test]
    fn generations_replace_whole() {
        let store = SnapshotStore::new(Arc::new(MemoryCollection::new()));
        let excluded = BTreeSet::new();
        store
            .capture("Sample", &[record(1, "A"), record(2, "B")], &excluded)
            .unwrap();
        store.capture("Sample", &[record(2, "B2")], &excluded).unwrap();

        let map = store.get("Sample").unwrap();
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));
    }

    #[test]
    fn last_sync_roundtrip() {
        let store = SnapshotStore::new(Arc::new(MemoryCollection::new()));
        assert!(store.last_sync("Sample").unwrap().is_none());

        let when = Utc::now();
        store.set_last_sync("Sample", when).unwrap();

        let read = store.last_sync("Sample").unwrap().unwrap();
        assert_eq!(read.timestamp(), when.timestamp());
    }

    #[test]
    fn unreadable_last_sync_reads_as_none() {
        let collection = Arc::new(MemoryCollection::new());
        collection.put_meta("Sample_last_sync", "yesterday").unwrap();

        let store = SnapshotStore::new(collection);
        assert!(store.last_sync("Sample").unwrap().is_none());
    }

    #[test]
    fn entities_do_not_share_snapshots() {
        let store = SnapshotStore::new(Arc::new(MemoryCollection::new()));
        let excluded = BTreeSet::new();
        store.capture("Sample", &[record(1, "A")], &excluded).unwrap();

        assert!(store.get("Other").unwrap().is_empty());
        assert_eq!(store.get("Sample").unwrap().len(), 1);
    }
}
