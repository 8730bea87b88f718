//! Push: send new and modified rows to the remote store.
//!
//! Identity is resolved per record: the id field wins, then the pending
//! server id from an earlier create, then a natural-key lookup. A record
//! with an identity is updated, anything else is created. One record's
//! failure never aborts the batch.

use chrono::Utc;

use coresync_schema::EntityType;
use coresync_store::{LocalCollection, RowId};

use crate::detect::PendingChange;
use crate::engine::{record_id, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressSink;
use crate::remote::RemoteStore;

/// One record that failed to push.
#[derive(Debug, Clone)]
pub struct PushError {
    /// Label of the failed record.
    pub display_name: String,
    /// What went wrong, suitable for showing verbatim.
    pub message: String,
    /// Local row the failure belongs to.
    pub row_id: RowId,
}

/// Outcome of one push.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    /// Records created on the remote.
    pub created: usize,
    /// Records updated on the remote.
    pub updated: usize,
    /// Per-record failures, in encounter order.
    pub errors: Vec<PushError>,
}

impl PushReport {
    /// True when every offered record went through.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

enum PushOutcome {
    Created,
    Updated,
}

impl<R: RemoteStore, C: LocalCollection> SyncEngine<R, C> {
    /// Detects changes and pushes them in one call.
    pub fn push(&self, entity_name: &str, progress: &ProgressSink) -> SyncResult<PushReport> {
        let report = self.detect_changes(entity_name)?;
        self.push_changes(entity_name, report.changed, progress)
    }

    /// Pushes already-detected changes, in order.
    ///
    /// Returns an error only when the whole operation cannot proceed
    /// (unknown entity, push not supported, a failing local store).
    /// Remote failures are collected per record in the report; a failed
    /// record keeps its dirty flag and is re-offered by the next
    /// detection pass.
    pub fn push_changes(
        &self,
        entity_name: &str,
        changes: Vec<PendingChange>,
        progress: &ProgressSink,
    ) -> SyncResult<PushReport> {
        match self.push_inner(entity_name, changes, progress) {
            Ok(report) => {
                {
                    let mut stats = self.stats.write();
                    stats.pushes_completed += 1;
                    stats.records_created += report.created as u64;
                    stats.records_updated += report.updated as u64;
                    stats.record_errors += report.errors.len() as u64;
                }
                Ok(report)
            }
            Err(err) => {
                self.note_error(&err);
                Err(err)
            }
        }
    }

    fn push_inner(
        &self,
        entity_name: &str,
        changes: Vec<PendingChange>,
        progress: &ProgressSink,
    ) -> SyncResult<PushReport> {
        let entity = self.entity(entity_name)?;
        if !entity.supports_push() {
            return Err(SyncError::PushNotSupported(entity_name.to_string()));
        }

        let total = changes.len();
        let mut report = PushReport::default();
        let mut synced: Vec<RowId> = Vec::with_capacity(total);
        for (index, change) in changes.iter().enumerate() {
            progress.report((index * 100 / total.max(1)) as u8, &change.display_name);
            match self.push_one(entity, change) {
                Ok(PushOutcome::Created) => {
                    report.created += 1;
                    synced.push(change.row_id);
                }
                Ok(PushOutcome::Updated) => {
                    report.updated += 1;
                    synced.push(change.row_id);
                }
                Err(err) => {
                    tracing::warn!(
                        entity = entity.name(),
                        record = %change.display_name,
                        %err,
                        "record push failed"
                    );
                    report.errors.push(PushError {
                        display_name: change.display_name.clone(),
                        message: err.to_string(),
                        row_id: change.row_id,
                    });
                }
            }
        }

        for row_id in synced {
            self.collection.mark_synced(row_id)?;
        }
        self.snapshots.set_last_sync(entity.name(), Utc::now())?;

        tracing::info!(
            entity = entity.name(),
            created = report.created,
            updated = report.updated,
            failed = report.errors.len(),
            "push complete"
        );
        progress.finish("push complete");
        Ok(report)
    }

    fn push_one(&self, entity: &EntityType, change: &PendingChange) -> SyncResult<PushOutcome> {
        match self.resolve_identity(entity, change)? {
            Some(id) => {
                self.remote.update(entity, id, &change.payload)?;
                Ok(PushOutcome::Updated)
            }
            None => {
                let stored = self.remote.create(entity, &change.payload)?;
                let id = record_id(&stored)
                    .ok_or_else(|| SyncError::remote("create response carried no id"))?;
                self.collection.set_pending_remote_id(change.row_id, id)?;
                Ok(PushOutcome::Created)
            }
        }
    }

    /// Resolves the remote identity a change should be written to.
    ///
    /// The id field wins, then the pending marker from an earlier create
    /// this session, then a natural-key lookup against the remote.
    fn resolve_identity(
        &self,
        entity: &EntityType,
        change: &PendingChange,
    ) -> SyncResult<Option<i64>> {
        if let Some(id) = change.remote_id {
            return Ok(Some(id));
        }
        if let Some(id) = change.pending_remote_id {
            return Ok(Some(id));
        }
        if let Some(key) = &change.natural_key {
            let found = self.remote.find_by_natural_key(entity, key)?;
            return Ok(found.as_ref().and_then(record_id));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::remote::MockRemoteStore;
    use coresync_protocol::{ListPage, PullQuery};
    use coresync_schema::{FieldSchema, FieldType, SchemaRegistry};
    use coresync_store::MemoryCollection;
    use coresync_value::{Record, Value};

    fn sample_type() -> EntityType {
        EntityType::new("Sample")
            .with_fields(vec![
                FieldSchema::new("name", FieldType::String),
                FieldSchema::new("value", FieldType::Double),
            ])
            .with_natural_key(["name"])
    }

    fn engine() -> SyncEngine<MockRemoteStore, MemoryCollection> {
        let registry = SchemaRegistry::new(vec![sample_type()]).unwrap();
        SyncEngine::new(
            registry,
            MockRemoteStore::new(),
            MemoryCollection::new(),
            SyncConfig::new(),
        )
    }

    fn local_record(name: &str, value: f64) -> Record {
        Record::from_pairs(vec![
            ("name".to_string(), Value::from(name)),
            ("value".to_string(), Value::Float(value)),
        ])
    }

    #[test]
    fn new_rows_are_created_and_marked() {
        let engine = engine();
        let row_id = engine.collection().insert_local(local_record("A", 1.5), None);

        let report = engine.push("Sample", &ProgressSink::none()).unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);
        assert!(report.is_complete());

        let row = engine.collection().row(row_id).unwrap();
        assert_eq!(row.pending_remote_id, Some(1000));
        assert!(!row.dirty);

        let created = engine.remote.created();
        assert_eq!(created.len(), 1);
        assert!(created[0].get("id").is_none());
        assert!(engine.snapshots().last_sync("Sample").unwrap().is_some());

        let stats = engine.stats();
        assert_eq!(stats.pushes_completed, 1);
        assert_eq!(stats.records_created, 1);
    }

    #[test]
    fn second_push_updates_through_the_pending_marker() {
        let engine = engine();
        engine.collection().insert_local(local_record("A", 1.5), None);
        engine.push("Sample", &ProgressSink::none()).unwrap();

        let report = engine.push("Sample", &ProgressSink::none()).unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);
        let updated = engine.remote.updated();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0, 1000);
    }

    #[test]
    fn rows_with_an_id_are_updated() {
        let engine = engine();
        engine.remote.set_pages(vec![ListPage::new(vec![Record::from_pairs(vec![
            ("id".to_string(), Value::Int(7)),
            ("name".to_string(), Value::from("A")),
            ("value".to_string(), Value::Float(1.0)),
        ])])]);
        engine
            .pull("Sample", &PullQuery::new(), &ProgressSink::none())
            .unwrap();

        let row = engine.collection().iterate_all().unwrap().remove(0);
        engine
            .collection()
            .update_attributes(row.row_id, &[("value".to_string(), Value::Float(2.0))])
            .unwrap();

        let report = engine.push("Sample", &ProgressSink::none()).unwrap();

        assert_eq!(report.updated, 1);
        let updated = engine.remote.updated();
        assert_eq!(updated[0].0, 7);
        assert!(updated[0].1.get("id").is_none());
    }

    #[test]
    fn natural_key_lookup_resolves_an_identity() {
        let engine = engine();
        engine.collection().insert_local(local_record("A", 1.5), None);
        engine.remote.push_key_result(Some(Record::from_pairs(vec![(
            "id".to_string(),
            Value::Int(42),
        )])));

        let report = engine.push("Sample", &ProgressSink::none()).unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);
        assert_eq!(engine.remote.updated()[0].0, 42);
    }

    #[test]
    fn one_failure_never_aborts_the_batch() {
        let engine = engine();
        engine.collection().insert_local(local_record("A", 1.0), None);
        let bad_row = engine.collection().insert_local(local_record("bad", 2.0), None);
        engine.collection().insert_local(local_record("C", 3.0), None);
        engine.remote.reject_value("name", "bad");

        let report = engine.push("Sample", &ProgressSink::none()).unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_complete());
        let failure = &report.errors[0];
        assert_eq!(failure.display_name, "bad");
        assert_eq!(failure.row_id, bad_row);
        assert!(failure.message.contains("rejected"));

        // The failed row stays dirty for the next attempt.
        let row = engine.collection().row(bad_row).unwrap();
        assert!(row.dirty);
        assert_eq!(row.pending_remote_id, None);

        let stats = engine.stats();
        assert_eq!(stats.record_errors, 1);
        assert_eq!(stats.records_created, 2);
    }

    #[test]
    fn pull_only_entities_cannot_push() {
        let registry =
            SchemaRegistry::new(vec![EntityType::new("Readonly").pull_only()]).unwrap();
        let engine = SyncEngine::new(
            registry,
            MockRemoteStore::new(),
            MemoryCollection::new(),
            SyncConfig::new(),
        );

        let err = engine
            .push_changes("Readonly", Vec::new(), &ProgressSink::none())
            .unwrap_err();
        assert!(matches!(err, SyncError::PushNotSupported(_)));
    }

    #[test]
    fn empty_push_completes_quietly() {
        let engine = engine();
        let report = engine.push("Sample", &ProgressSink::none()).unwrap();
        assert_eq!(report.created + report.updated, 0);
        assert!(report.is_complete());
    }
}
