//! Remote store abstraction.
//!
//! The engine talks to the remote side exclusively through [`RemoteStore`],
//! so the HTTP binding can be swapped for an in-process fake in tests.

use std::sync::Mutex;

use coresync_protocol::{ListPage, PullQuery};
use coresync_schema::EntityType;
use coresync_value::Record;

use crate::error::{SyncError, SyncResult};

/// A paginated REST-style store holding the authoritative records.
pub trait RemoteStore: Send + Sync {
    /// Fetches one listing page for `entity`.
    ///
    /// `page_token` is `None` for the first page; subsequent calls pass the
    /// token from the previous [`ListPage`].
    fn list(
        &self,
        entity: &EntityType,
        query: &PullQuery,
        page_token: Option<&str>,
    ) -> SyncResult<ListPage>;

    /// Creates a record and returns it as stored, including the new id.
    fn create(&self, entity: &EntityType, payload: &Record) -> SyncResult<Record>;

    /// Updates the record with `id` and returns it as stored.
    fn update(&self, entity: &EntityType, id: i64, payload: &Record) -> SyncResult<Record>;

    /// Looks up a single record by its natural key fields.
    fn find_by_natural_key(
        &self,
        entity: &EntityType,
        key: &Record,
    ) -> SyncResult<Option<Record>>;
}

/// Canned-response remote store for unit tests.
///
/// Pages set with [`set_pages`](MockRemoteStore::set_pages) are chained
/// automatically; create and update calls are recorded for assertions.
#[derive(Default)]
pub struct MockRemoteStore {
    pages: Mutex<Vec<ListPage>>,
    list_calls: Mutex<usize>,
    fail_list_at: Mutex<Option<usize>>,
    created: Mutex<Vec<Record>>,
    updated: Mutex<Vec<(i64, Record)>>,
    key_results: Mutex<Vec<Option<Record>>>,
    reject_field: Mutex<Option<(String, String)>>,
    next_id: Mutex<i64>,
}

impl MockRemoteStore {
    /// Creates a mock with no pages and ids starting at 1000.
    #[must_use]
    pub fn new() -> Self {
        MockRemoteStore {
            next_id: Mutex::new(1000),
            ..MockRemoteStore::default()
        }
    }

    /// Installs listing pages, chaining their page tokens in order.
    pub fn set_pages(&self, pages: Vec<ListPage>) {
        let last = pages.len().saturating_sub(1);
        let linked = pages
            .into_iter()
            .enumerate()
            .map(|(index, page)| {
                if index < last {
                    page.with_next_page_token((index + 1).to_string())
                } else {
                    page
                }
            })
            .collect();
        *self.pages.lock().unwrap() = linked;
        *self.list_calls.lock().unwrap() = 0;
    }

    /// Makes the n-th `list` call (zero-based) fail with a retryable error.
    pub fn fail_list_at(&self, call: usize) {
        *self.fail_list_at.lock().unwrap() = Some(call);
    }

    /// Rejects any create or update whose `field` equals `value`.
    pub fn reject_value(&self, field: impl Into<String>, value: impl Into<String>) {
        *self.reject_field.lock().unwrap() = Some((field.into(), value.into()));
    }

    /// Queues results for `find_by_natural_key`, served in order.
    pub fn push_key_result(&self, result: Option<Record>) {
        self.key_results.lock().unwrap().push(result);
    }

    /// Returns the payloads passed to `create` so far.
    #[must_use]
    pub fn created(&self) -> Vec<Record> {
        self.created.lock().unwrap().clone()
    }

    /// Returns the `(id, payload)` pairs passed to `update` so far.
    #[must_use]
    pub fn updated(&self) -> Vec<(i64, Record)> {
        self.updated.lock().unwrap().clone()
    }

    fn check_rejection(&self, payload: &Record) -> SyncResult<()> {
        if let Some((field, value)) = self.reject_field.lock().unwrap().as_ref() {
            let hit = payload
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| s == value);
            if hit {
                return Err(SyncError::validation(format!("{field} '{value}' rejected")));
            }
        }
        Ok(())
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }
}

impl RemoteStore for MockRemoteStore {
    fn list(
        &self,
        _entity: &EntityType,
        _query: &PullQuery,
        page_token: Option<&str>,
    ) -> SyncResult<ListPage> {
        let call = {
            let mut calls = self.list_calls.lock().unwrap();
            let current = *calls;
            *calls += 1;
            current
        };
        if *self.fail_list_at.lock().unwrap() == Some(call) {
            return Err(SyncError::transport_retryable("connection reset"));
        }
        let index = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SyncError::remote(format!("unknown page token '{token}'")))?,
        };
        let pages = self.pages.lock().unwrap();
        pages
            .get(index)
            .cloned()
            .ok_or_else(|| SyncError::remote(format!("no page at index {index}")))
    }

    fn create(&self, _entity: &EntityType, payload: &Record) -> SyncResult<Record> {
        self.check_rejection(payload)?;
        let mut stored = payload.clone();
        stored.set("id", self.allocate_id());
        self.created.lock().unwrap().push(payload.clone());
        Ok(stored)
    }

    fn update(&self, _entity: &EntityType, id: i64, payload: &Record) -> SyncResult<Record> {
        self.check_rejection(payload)?;
        let mut stored = payload.clone();
        stored.set("id", id);
        self.updated.lock().unwrap().push((id, payload.clone()));
        Ok(stored)
    }

    fn find_by_natural_key(
        &self,
        _entity: &EntityType,
        _key: &Record,
    ) -> SyncResult<Option<Record>> {
        let mut results = self.key_results.lock().unwrap();
        if results.is_empty() {
            Ok(None)
        } else {
            Ok(results.remove(0))
        }
    }
}
