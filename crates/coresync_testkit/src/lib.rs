//! # CoreSync Testkit
//!
//! Test utilities for CoreSync.
//!
//! This crate provides:
//! - Catalog fixtures and record builders
//! - A [`SyncHarness`] wiring an engine to in-memory fakes
//! - [`MemoryRemote`], a stateful remote-store fake with pagination and
//!   failure injection, plus [`RestServer`] to drive the HTTP path
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coresync_testkit::prelude::*;
//!
//! #[test]
//! fn detects_nothing_after_a_pull() {
//!     let harness = scenarios::pulled_samples(3);
//!     assert!(harness.detect_changes("Sample").unwrap().is_empty());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
