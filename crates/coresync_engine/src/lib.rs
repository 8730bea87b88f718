//! # CoreSync Engine
//!
//! Bidirectional synchronization between a local collection of typed,
//! optionally geometric records and a remote paginated REST store.
//!
//! The engine has three verbs. **Pull** fetches the full listing for an
//! entity type, derives the local field set, rebuilds the collection and
//! captures a content-hash snapshot of what the server sent. **Detect**
//! fingerprints every local row against that snapshot and classifies it
//! as unchanged, modified or new. **Push** sends new and modified rows
//! back, resolving create-versus-update per record and collecting
//! per-record failures without aborting the batch.
//!
//! ```
//! use coresync_engine::{MockRemoteStore, ProgressSink, SyncConfig, SyncEngine};
//! use coresync_protocol::{ListPage, PullQuery};
//! use coresync_schema::{EntityType, FieldSchema, FieldType, SchemaRegistry};
//! use coresync_store::MemoryCollection;
//! use coresync_value::{Record, Value};
//!
//! let catalog = vec![EntityType::new("Sample").with_fields(vec![
//!     FieldSchema::new("name", FieldType::String),
//!     FieldSchema::new("value", FieldType::Double),
//! ])];
//! let registry = SchemaRegistry::new(catalog).unwrap();
//!
//! let remote = MockRemoteStore::new();
//! remote.set_pages(vec![ListPage::new(vec![Record::from_pairs(vec![
//!     ("id".to_string(), Value::Int(1)),
//!     ("name".to_string(), Value::from("A")),
//!     ("value".to_string(), Value::Float(1.5)),
//! ])])]);
//!
//! let engine = SyncEngine::new(registry, remote, MemoryCollection::new(), SyncConfig::new());
//! let pulled = engine
//!     .pull("Sample", &PullQuery::new(), &ProgressSink::none())
//!     .unwrap();
//! assert_eq!(pulled.added, 1);
//!
//! // A fresh pull leaves nothing to push.
//! let report = engine.detect_changes("Sample").unwrap();
//! assert!(report.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod detect;
mod driver;
mod engine;
mod error;
mod http;
mod progress;
mod pull;
mod push;
mod remote;
mod snapshot;

pub use config::SyncConfig;
pub use detect::{ChangeKind, ChangeReport, PendingChange};
pub use driver::{sync_all, SyncTask, TaskKind, TaskOutcome, TaskResult};
pub use engine::{SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpMethod, HttpRemoteStore, HttpRequest, HttpResponse, LoopbackClient,
    LoopbackServer,
};
pub use progress::ProgressSink;
pub use pull::PullResult;
pub use push::{PushError, PushReport};
pub use remote::{MockRemoteStore, RemoteStore};
pub use snapshot::{SnapshotMap, SnapshotStore};
