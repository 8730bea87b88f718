//! # CoreSync Schema
//!
//! Static, per-entity-type metadata: field definitions with types,
//! lengths and read-only flags, geometry kind, natural-key fields, and
//! the push/pull capability switches. The [`SchemaRegistry`] is built
//! once at startup from a fixed catalog and is read-only afterwards.
//!
//! The registry also owns the excluded-field set: volatile server
//! bookkeeping (audit timestamps, computed aggregates) that must never
//! participate in change detection and is never required for push.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod registry;
mod types;

pub use error::{SchemaError, SchemaResult};
pub use registry::{SchemaRegistry, DEFAULT_EXCLUDED_FIELDS, LONG_TEXT_FIELDS};
pub use types::{
    EntityType, FieldSchema, FieldType, GeometryKind, GEOMETRY_FALLBACK_FIELD, GEOMETRY_FIELD,
    ID_FIELD,
};
