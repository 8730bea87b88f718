//! # CoreSync Protocol
//!
//! Wire shapes exchanged with a remote store: the pull query with its
//! filter parameters, the paginated listing page, and the record⇄JSON
//! conversions. The engine stays agnostic to the transport underneath;
//! everything here is plain field-name-keyed JSON.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod page;
mod query;
mod wire;

pub use error::{WireError, WireResult};
pub use page::ListPage;
pub use query::PullQuery;
pub use wire::{
    record_from_body, record_from_json, record_to_json, records_from_json, remote_error_message,
};
