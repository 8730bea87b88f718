//! # CoreSync Value
//!
//! Dynamic field values, canonicalization and content fingerprints.
//!
//! Records arrive from a loosely-typed transport: the same logical value
//! may show up as a boolean or its string form, a float with precision
//! noise, a geometry string with or without a spatial-reference prefix,
//! or a datetime in any of several serializations. This crate provides:
//!
//! - [`Value`]: a dynamic tagged union covering everything a record
//!   field can hold
//! - [`Record`]: an ordered field-name to value mapping
//! - [`canonicalize`]: a pure, deterministic normalization of one value
//! - [`fingerprint`]: a stable content hash of one record
//!
//! Two values that are "the same" across a pull/edit/re-display round
//! trip canonicalize identically, and two records compare equal iff
//! their fingerprints are equal.
//!
//! ## Usage
//!
//! ```
//! use coresync_value::{fingerprint, Record, Value};
//! use std::collections::BTreeSet;
//!
//! let mut record = Record::new();
//! record.set("name", "A");
//! record.set("collected", true);
//!
//! let excluded = BTreeSet::new();
//! let a = fingerprint(&record, &excluded).unwrap();
//!
//! // The stringified boolean hashes the same as the real one.
//! record.set("collected", "true");
//! let b = fingerprint(&record, &excluded).unwrap();
//! assert_eq!(a, b);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod canon;
mod error;
mod fingerprint;
mod geometry;
mod value;

pub use canon::{canonical_datetime, canonicalize, round6};
pub use error::{ValueError, ValueResult};
pub use fingerprint::{canonical_record, fingerprint, to_canonical_json};
pub use geometry::Geometry;
pub use value::{from_json, to_json, Record, Value};
