//! # CoreSync Store
//!
//! The local collection boundary: the trait the sync engine requires
//! from whatever host actually stores rows, plus an in-memory
//! reference implementation.
//!
//! Collections are **row stores with a metadata side channel**. The
//! engine rebuilds their schema wholesale on pull, batch-inserts
//! mapped records, iterates rows for change detection, and writes
//! per-row sync markers after push. The metadata key/value channel is
//! where snapshots persist, scoped to the collection's container so
//! they survive close and reopen.
//!
//! ## Example
//!
//! ```rust
//! use coresync_store::{LocalCollection, MemoryCollection};
//! use coresync_value::Record;
//!
//! let collection = MemoryCollection::new();
//! let mut record = Record::new();
//! record.set("id", 1);
//! record.set("name", "A");
//! collection.batch_insert(vec![record]).unwrap();
//! assert_eq!(collection.iterate_all().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod memory;

pub use collection::{LocalCollection, LocalRow, RowId};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryCollection;
