//! Change detection: fingerprint local rows against the snapshot.
//!
//! Detection never talks to the remote store. Each row is converted back
//! to the shape the remote would have sent, hashed, and compared to the
//! snapshot captured by the last pull. The hash is the whole test; there
//! is no per-field diffing.

use std::collections::BTreeSet;

use coresync_schema::{EntityType, GEOMETRY_FIELD};
use coresync_store::{LocalCollection, LocalRow, RowId};
use coresync_value::{fingerprint, round6, Record, Value};

use crate::engine::{record_id, SyncEngine};
use crate::error::SyncResult;
use crate::remote::RemoteStore;

/// Why a row needs pushing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The row is not in the snapshot (no id, or an id the last pull
    /// never saw).
    New,
    /// The row's content hash differs from the snapshot entry.
    Modified,
}

/// One row due for pushing, with everything the push step needs.
#[derive(Debug, Clone)]
pub struct PendingChange {
    /// Local row to reconcile after the push.
    pub row_id: RowId,
    /// Remote identity read from the row's id field.
    pub remote_id: Option<i64>,
    /// Server id from an earlier create that no pull has folded in yet.
    pub pending_remote_id: Option<i64>,
    /// Natural key values, when the entity declares a key and the row
    /// has them all.
    pub natural_key: Option<Record>,
    /// Label for progress and error reporting.
    pub display_name: String,
    /// New or modified.
    pub kind: ChangeKind,
    /// Payload to send, already filtered for pushing.
    pub payload: Record,
}

/// Outcome of one detection run.
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    /// Rows that need pushing, in row order.
    pub changed: Vec<PendingChange>,
    /// Rows examined.
    pub total_checked: usize,
    /// Rows whose hash matched the snapshot.
    pub skipped_unchanged: usize,
}

impl ChangeReport {
    /// True when nothing needs pushing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

impl<R: RemoteStore, C: LocalCollection> SyncEngine<R, C> {
    /// Classifies every local row as unchanged, modified or new.
    ///
    /// Unchanged rows are counted and dropped; the report carries a
    /// ready-to-push [`PendingChange`] for everything else. Detection is
    /// read-only: neither the collection nor the snapshot is touched.
    pub fn detect_changes(&self, entity_name: &str) -> SyncResult<ChangeReport> {
        let entity = self.entity(entity_name)?;
        let snapshot = self.snapshots.get(entity.name())?;
        let excluded = self.registry.excluded_fields();
        let spatial_ref = self.collection.spatial_ref();
        let rows = self.collection.iterate_all()?;

        let mut report = ChangeReport {
            total_checked: rows.len(),
            ..ChangeReport::default()
        };
        for row in &rows {
            let shape = remote_shape(row, excluded, spatial_ref);
            let remote_id = record_id(&shape);
            let kind = match remote_id.and_then(|id| snapshot.get(&id)) {
                None => ChangeKind::New,
                Some(known) => {
                    if *known == fingerprint(&shape, excluded)? {
                        report.skipped_unchanged += 1;
                        continue;
                    }
                    ChangeKind::Modified
                }
            };
            report.changed.push(PendingChange {
                row_id: row.row_id,
                remote_id,
                pending_remote_id: row.pending_remote_id,
                natural_key: self.registry.natural_key(entity, &shape),
                display_name: display_name(entity, &shape, row.row_id),
                kind,
                payload: self.registry.filter_for_push(entity, &shape),
            });
        }
        tracing::debug!(
            entity = entity.name(),
            changed = report.changed.len(),
            unchanged = report.skipped_unchanged,
            "change detection complete"
        );
        Ok(report)
    }
}

/// Converts a local row back to the value conventions of the remote
/// store: booleans as `"true"`/`"false"` text, floats rounded to six
/// decimals, geometry as EWKT prefixed with the collection's spatial
/// reference.
///
/// Columns materialized from a flattened excluded composite are left
/// out; the remote never saw them as top-level fields.
fn remote_shape(row: &LocalRow, excluded: &BTreeSet<String>, spatial_ref: u32) -> Record {
    let mut shape = Record::with_capacity(row.attributes.len() + 1);
    for (name, value) in row.attributes.iter() {
        if is_flattened_column(name, excluded) {
            continue;
        }
        shape.set(name.to_string(), remote_value(value));
    }
    if let Some(geometry) = &row.geometry {
        shape.set(
            GEOMETRY_FIELD.to_string(),
            Value::Str(geometry.with_srid(spatial_ref).ewkt()),
        );
    }
    shape
}

fn remote_value(value: &Value) -> Value {
    match value {
        Value::Bool(flag) => Value::Str(if *flag { "true" } else { "false" }.to_string()),
        Value::Float(x) => Value::Float(round6(*x)),
        other => other.clone(),
    }
}

/// True for `{parent}_{subkey}` columns created by composite flattening.
fn is_flattened_column(name: &str, excluded: &BTreeSet<String>) -> bool {
    excluded.iter().any(|parent| {
        name.len() > parent.len() + 1
            && name.starts_with(parent.as_str())
            && name.as_bytes()[parent.len()] == b'_'
    })
}

/// Picks a label for a row: its name field, then its natural key
/// values, then the bare row id.
fn display_name(entity: &EntityType, shape: &Record, row_id: RowId) -> String {
    if let Some(name) = shape.get("name").and_then(Value::as_str) {
        if !name.is_empty() {
            return name.to_string();
        }
    }
    let key_parts: Vec<String> = entity
        .natural_key_fields()
        .iter()
        .filter_map(|field| shape.get(field))
        .filter(|value| !value.is_null())
        .map(ToString::to_string)
        .collect();
    if !key_parts.is_empty() {
        return key_parts.join(" ");
    }
    format!("row {row_id}")
}
