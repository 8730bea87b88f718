//! Local collection trait definition.

use crate::error::StoreResult;
use coresync_schema::{FieldSchema, GeometryKind};
use coresync_value::{Geometry, Record, Value};
use std::fmt;

/// Identifier of one row within a local collection.
///
/// Row ids are local bookkeeping only; they are never sent to the
/// remote store and carry no meaning across a schema recreate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl RowId {
    /// Creates a row id from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One materialized row: attributes, geometry, and sync markers.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRow {
    /// Local row identifier.
    pub row_id: RowId,
    /// Attribute values, in field order.
    pub attributes: Record,
    /// Geometry, when the collection stores one.
    pub geometry: Option<Geometry>,
    /// Server-assigned id from a successful create that has not yet
    /// been reconciled into the identity field by a pull.
    pub pending_remote_id: Option<i64>,
    /// True when the row has local edits not yet pushed.
    pub dirty: bool,
}

/// The row store a sync engine drives.
///
/// Implementations use interior mutability: the engine holds a shared
/// reference and different entity types may be synced from different
/// threads, each against its own collection.
///
/// # Invariants
///
/// - `recreate_schema` drops every row; the metadata channel survives.
/// - `batch_insert` preserves the order of the given records and
///   extracts the geometry field (`geometry`, as a [`Geometry`] value
///   or parseable text) into the row's geometry slot.
/// - Rows inserted by `batch_insert` start clean (not dirty) and with
///   no pending remote id.
/// - `iterate_all` returns rows in insertion order.
pub trait LocalCollection: Send + Sync {
    /// Drops all rows and rebuilds the schema from the given fields.
    fn recreate_schema(&self, fields: &[FieldSchema], geometry: GeometryKind) -> StoreResult<()>;

    /// Inserts records in bulk, returning the number inserted.
    fn batch_insert(&self, records: Vec<Record>) -> StoreResult<usize>;

    /// Returns every row, in insertion order.
    fn iterate_all(&self) -> StoreResult<Vec<LocalRow>>;

    /// Writes attribute values onto a row and marks it dirty.
    fn update_attributes(&self, row_id: RowId, attrs: &[(String, Value)]) -> StoreResult<()>;

    /// Reads a row's pending server id marker.
    fn pending_remote_id(&self, row_id: RowId) -> StoreResult<Option<i64>>;

    /// Stores a server-assigned id as the row's pending server id.
    fn set_pending_remote_id(&self, row_id: RowId, remote_id: i64) -> StoreResult<()>;

    /// Clears the row's dirty flag after a successful push.
    fn mark_synced(&self, row_id: RowId) -> StoreResult<()>;

    /// The spatial reference id the collection's geometries use.
    fn spatial_ref(&self) -> u32;

    /// Reads a metadata value scoped to the collection's container.
    fn get_meta(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a metadata value scoped to the collection's container.
    fn put_meta(&self, key: &str, value: &str) -> StoreResult<()>;
}
