//! The engine type binding a remote store to one local collection.

use std::sync::Arc;

use parking_lot::RwLock;

use coresync_schema::{EntityType, SchemaRegistry, ID_FIELD};
use coresync_store::LocalCollection;
use coresync_value::{Record, Value};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::snapshot::SnapshotStore;

/// Counters accumulated over the lifetime of one engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Pulls that ran to completion.
    pub pulls_completed: u64,
    /// Pushes that ran to completion (possibly with record errors).
    pub pushes_completed: u64,
    /// Records received across all pulls.
    pub records_pulled: u64,
    /// Records created on the remote across all pushes.
    pub records_created: u64,
    /// Records updated on the remote across all pushes.
    pub records_updated: u64,
    /// Per-record push failures.
    pub record_errors: u64,
    /// Most recent operation-level error, if any.
    pub last_error: Option<String>,
}

/// Synchronizes one local collection with a remote store.
///
/// The engine is cheap to share: every method takes `&self` and interior
/// state sits behind locks. One engine serves one collection; syncing a
/// second entity type means a second engine over its own collection, and
/// those run safely in parallel because snapshot state is keyed by entity
/// and stored in the collection itself.
///
/// ```
/// use coresync_engine::{MockRemoteStore, SyncConfig, SyncEngine};
/// use coresync_schema::{EntityType, SchemaRegistry};
/// use coresync_store::MemoryCollection;
///
/// let registry = SchemaRegistry::new(vec![EntityType::new("Sample")]).unwrap();
/// let engine = SyncEngine::new(
///     registry,
///     MockRemoteStore::new(),
///     MemoryCollection::new(),
///     SyncConfig::new(),
/// );
/// assert_eq!(engine.stats().pulls_completed, 0);
/// ```
pub struct SyncEngine<R: RemoteStore, C: LocalCollection> {
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) remote: Arc<R>,
    pub(crate) collection: Arc<C>,
    pub(crate) config: SyncConfig,
    pub(crate) snapshots: SnapshotStore<C>,
    pub(crate) stats: RwLock<SyncStats>,
}

impl<R: RemoteStore, C: LocalCollection> SyncEngine<R, C> {
    /// Creates an engine owning its parts.
    #[must_use]
    pub fn new(registry: SchemaRegistry, remote: R, collection: C, config: SyncConfig) -> Self {
        Self::from_shared(
            Arc::new(registry),
            Arc::new(remote),
            Arc::new(collection),
            config,
        )
    }

    /// Creates an engine over already-shared parts.
    ///
    /// Use this when several engines talk to the same remote store or
    /// when the host application keeps its own handle on the collection.
    #[must_use]
    pub fn from_shared(
        registry: Arc<SchemaRegistry>,
        remote: Arc<R>,
        collection: Arc<C>,
        config: SyncConfig,
    ) -> Self {
        let snapshots = SnapshotStore::new(Arc::clone(&collection));
        SyncEngine {
            registry,
            remote,
            collection,
            config,
            snapshots,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// The schema registry the engine validates against.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The local collection the engine reads and writes.
    #[must_use]
    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// The snapshot store backing change detection.
    #[must_use]
    pub fn snapshots(&self) -> &SnapshotStore<C> {
        &self.snapshots
    }

    /// Returns a copy of the accumulated counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    pub(crate) fn entity(&self, name: &str) -> SyncResult<&EntityType> {
        self.registry
            .get(name)
            .ok_or_else(|| SyncError::unknown_entity_type(name))
    }

    pub(crate) fn note_error(&self, err: &SyncError) {
        self.stats.write().last_error = Some(err.to_string());
    }
}

/// Extracts the remote identity from a record's id field.
///
/// Accepts an integer or integer-looking text; anything else means the
/// record has no identity yet.
pub(crate) fn record_id(record: &Record) -> Option<i64> {
    match record.get(ID_FIELD)? {
        Value::Int(id) => Some(*id),
        Value::Str(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemoteStore;
    use coresync_store::MemoryCollection;

    fn engine() -> SyncEngine<MockRemoteStore, MemoryCollection> {
        let registry = SchemaRegistry::new(vec![EntityType::new("Sample")]).unwrap();
        SyncEngine::new(
            registry,
            MockRemoteStore::new(),
            MemoryCollection::new(),
            SyncConfig::new(),
        )
    }

    #[test]
    fn unknown_entity_is_rejected() {
        let engine = engine();
        let err = engine.entity("Ghost").unwrap_err();
        assert!(matches!(err, SyncError::UnknownEntityType(_)));
        assert!(engine.entity("Sample").is_ok());
    }

    #[test]
    fn stats_start_at_zero() {
        let engine = engine();
        assert_eq!(engine.stats(), SyncStats::default());
    }

    #[test]
    fn note_error_keeps_the_latest() {
        let engine = engine();
        engine.note_error(&SyncError::remote("first"));
        engine.note_error(&SyncError::validation("second"));
        assert_eq!(
            engine.stats().last_error.as_deref(),
            Some("validation error: second")
        );
    }

    #[test]
    fn record_identity() {
        let with_int = Record::from_pairs(vec![("id".to_string(), Value::Int(5))]);
        assert_eq!(record_id(&with_int), Some(5));

        let with_text = Record::from_pairs(vec![("id".to_string(), Value::from(" 12 "))]);
        assert_eq!(record_id(&with_text), Some(12));

        let with_null = Record::from_pairs(vec![("id".to_string(), Value::Null)]);
        assert_eq!(record_id(&with_null), None);

        assert_eq!(record_id(&Record::new()), None);
    }
}
