//! In-memory collection for tests and ephemeral use.

use crate::collection::{LocalCollection, LocalRow, RowId};
use crate::error::{StoreError, StoreResult};
use coresync_schema::{FieldSchema, GeometryKind, GEOMETRY_FIELD};
use coresync_value::{Geometry, Record, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory [`LocalCollection`].
///
/// Stores rows in insertion order and keeps the metadata channel
/// across schema recreates, exactly as a persistent host would. Extra
/// constructors let tests plant locally-created (dirty) rows the way a
/// host application's editor would.
#[derive(Debug)]
pub struct MemoryCollection {
    spatial_ref: u32,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    fields: Vec<FieldSchema>,
    geometry_kind: GeometryKind,
    rows: Vec<LocalRow>,
    next_row_id: u64,
    meta: BTreeMap<String, String>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollection {
    /// Creates an empty collection with spatial reference 4326.
    #[must_use]
    pub fn new() -> Self {
        Self::with_spatial_ref(4326)
    }

    /// Creates an empty collection with the given spatial reference.
    #[must_use]
    pub fn with_spatial_ref(spatial_ref: u32) -> Self {
        Self {
            spatial_ref,
            inner: RwLock::new(Inner {
                next_row_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Inserts a locally-created row, as a host editor would: dirty,
    /// no pending remote id. Returns the new row id.
    pub fn insert_local(&self, attributes: Record, geometry: Option<Geometry>) -> RowId {
        let mut inner = self.inner.write();
        let row_id = inner.allocate_row_id();
        inner.rows.push(LocalRow {
            row_id,
            attributes,
            geometry,
            pending_remote_id: None,
            dirty: true,
        });
        row_id
    }

    /// Returns a copy of one row.
    pub fn row(&self, row_id: RowId) -> Option<LocalRow> {
        self.inner
            .read()
            .rows
            .iter()
            .find(|row| row.row_id == row_id)
            .cloned()
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    /// Returns true when no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }

    /// The current field definitions.
    pub fn fields(&self) -> Vec<FieldSchema> {
        self.inner.read().fields.clone()
    }

    /// The current geometry kind.
    pub fn geometry_kind(&self) -> GeometryKind {
        self.inner.read().geometry_kind
    }
}

impl Inner {
    fn allocate_row_id(&mut self) -> RowId {
        let row_id = RowId::new(self.next_row_id);
        self.next_row_id += 1;
        row_id
    }

    fn row_mut(&mut self, row_id: RowId) -> StoreResult<&mut LocalRow> {
        self.rows
            .iter_mut()
            .find(|row| row.row_id == row_id)
            .ok_or(StoreError::RowNotFound { row_id })
    }
}

/// Pulls the geometry field out of a record, leaving unparseable text
/// in place as a plain attribute.
fn take_geometry(record: &mut Record) -> Option<Geometry> {
    match record.remove(GEOMETRY_FIELD) {
        Some(Value::Geometry(geometry)) => Some(geometry),
        Some(Value::Str(text)) => match Geometry::parse(&text) {
            Some(geometry) => Some(geometry),
            None => {
                record.set(GEOMETRY_FIELD, text);
                None
            }
        },
        Some(other) => {
            record.set(GEOMETRY_FIELD, other);
            None
        }
        None => None,
    }
}

impl LocalCollection for MemoryCollection {
    fn recreate_schema(&self, fields: &[FieldSchema], geometry: GeometryKind) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.fields = fields.to_vec();
        inner.geometry_kind = geometry;
        inner.rows.clear();
        inner.next_row_id = 1;
        Ok(())
    }

    fn batch_insert(&self, records: Vec<Record>) -> StoreResult<usize> {
        let mut inner = self.inner.write();
        let count = records.len();
        for mut record in records {
            let geometry = take_geometry(&mut record);
            let row_id = inner.allocate_row_id();
            inner.rows.push(LocalRow {
                row_id,
                attributes: record,
                geometry,
                pending_remote_id: None,
                dirty: false,
            });
        }
        Ok(count)
    }

    fn iterate_all(&self) -> StoreResult<Vec<LocalRow>> {
        Ok(self.inner.read().rows.clone())
    }

    fn update_attributes(&self, row_id: RowId, attrs: &[(String, Value)]) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let row = inner.row_mut(row_id)?;
        for (name, value) in attrs {
            if name == GEOMETRY_FIELD {
                row.geometry = match value {
                    Value::Geometry(geometry) => Some(geometry.clone()),
                    Value::Str(text) => Geometry::parse(text),
                    _ => None,
                };
            } else {
                row.attributes.set(name.clone(), value.clone());
            }
        }
        row.dirty = true;
        Ok(())
    }

    fn pending_remote_id(&self, row_id: RowId) -> StoreResult<Option<i64>> {
        let inner = self.inner.read();
        inner
            .rows
            .iter()
            .find(|row| row.row_id == row_id)
            .map(|row| row.pending_remote_id)
            .ok_or(StoreError::RowNotFound { row_id })
    }

    fn set_pending_remote_id(&self, row_id: RowId, remote_id: i64) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.row_mut(row_id)?.pending_remote_id = Some(remote_id);
        Ok(())
    }

    fn mark_synced(&self, row_id: RowId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.row_mut(row_id)?.dirty = false;
        Ok(())
    }

    fn spatial_ref(&self) -> u32 {
        self.spatial_ref
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.read().meta.get(key).cloned())
    }

    fn put_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner
            .write()
            .meta
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
