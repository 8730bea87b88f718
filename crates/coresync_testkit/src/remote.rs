//! Stateful remote-store fake.
//!
//! [`MemoryRemote`] behaves like a miniature REST backend: one table per
//! entity path, server-assigned ids, real pagination and equality filters.
//! Failure injection covers the situations the engine has to survive
//! without corrupting local state: a rejected record and a dead
//! connection. [`RestServer`] exposes the same tables through the
//! loopback HTTP path so the full wire stack can be tested in-process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use coresync_engine::{HttpResponse, LoopbackServer, RemoteStore, SyncError, SyncResult};
use coresync_protocol::{record_from_body, record_to_json, ListPage, PullQuery};
use coresync_schema::{EntityType, SchemaRegistry, ID_FIELD};
use coresync_value::{Record, Value};

/// In-memory [`RemoteStore`] with per-path tables and failure injection.
///
/// Unlike [`coresync_engine::MockRemoteStore`], which replays canned
/// pages, this fake owns real state: created records land in a table,
/// updates merge into it, and subsequent listings reflect both.
pub struct MemoryRemote {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    next_id: AtomicI64,
    offline: AtomicBool,
    rejects: RwLock<Vec<(String, String)>>,
    created: RwLock<Vec<(String, Record)>>,
    updated: RwLock<Vec<(String, i64, Record)>>,
}

impl MemoryRemote {
    /// Creates an empty remote. Server ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        MemoryRemote {
            tables: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            offline: AtomicBool::new(false),
            rejects: RwLock::new(Vec::new()),
            created: RwLock::new(Vec::new()),
            updated: RwLock::new(Vec::new()),
        }
    }

    /// Inserts records into the entity's table, assigning ids where the
    /// record carries none. Returns the ids in insertion order.
    pub fn seed(&self, entity: &EntityType, records: Vec<Record>) -> Vec<i64> {
        let mut tables = self.tables.write();
        let table = tables.entry(entity.remote_path().to_string()).or_default();
        let mut ids = Vec::with_capacity(records.len());
        for mut record in records {
            let id = match record.get(ID_FIELD).and_then(Value::as_int) {
                Some(id) => id,
                None => {
                    let id = self.allocate_id();
                    record.set(ID_FIELD, Value::Int(id));
                    id
                }
            };
            ids.push(id);
            table.push(record);
        }
        ids
    }

    /// Returns a copy of the entity's table.
    #[must_use]
    pub fn records(&self, entity: &EntityType) -> Vec<Record> {
        self.tables
            .read()
            .get(entity.remote_path())
            .cloned()
            .unwrap_or_default()
    }

    /// Looks up one record by server id.
    #[must_use]
    pub fn record(&self, entity: &EntityType, id: i64) -> Option<Record> {
        self.tables.read().get(entity.remote_path()).and_then(|t| {
            t.iter()
                .find(|r| r.get(ID_FIELD).and_then(Value::as_int) == Some(id))
                .cloned()
        })
    }

    /// Simulates losing or regaining the connection. While offline every
    /// call fails with a retryable transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Rejects any create or update whose `field` renders as `value`.
    pub fn reject_value(&self, field: impl Into<String>, value: impl Into<String>) {
        self.rejects.write().push((field.into(), value.into()));
    }

    /// Accepts everything again.
    pub fn clear_rejects(&self) {
        self.rejects.write().clear();
    }

    /// Payloads accepted by `create`, oldest first, with their paths.
    #[must_use]
    pub fn created(&self) -> Vec<(String, Record)> {
        self.created.read().clone()
    }

    /// Payloads accepted by `update`, oldest first, with path and id.
    #[must_use]
    pub fn updated(&self) -> Vec<(String, i64, Record)> {
        self.updated.read().clone()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_online(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(SyncError::transport_retryable("remote offline"));
        }
        Ok(())
    }

    fn check_rejects(&self, payload: &Record) -> SyncResult<()> {
        for (field, value) in self.rejects.read().iter() {
            let hit = payload
                .get(field)
                .map(rendered_text)
                .is_some_and(|text| text == *value);
            if hit {
                return Err(SyncError::validation(format!(
                    "{field} '{value}' rejected"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryRemote {
    fn list(
        &self,
        entity: &EntityType,
        query: &PullQuery,
        page_token: Option<&str>,
    ) -> SyncResult<ListPage> {
        self.check_online()?;
        let filtered: Vec<Record> = self
            .records(entity)
            .into_iter()
            .filter(|record| matches_filters(record, query.filters()))
            .collect();
        let total = filtered.len() as u64;

        let Some(page_size) = query.page_size().map(|s| s.max(1) as usize) else {
            return Ok(ListPage::new(filtered).with_total(total));
        };
        let index = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SyncError::validation(format!("invalid page '{token}'")))?,
        };
        let start = index * page_size;
        let end = (start + page_size).min(filtered.len());
        let records = filtered
            .get(start..end)
            .map(<[Record]>::to_vec)
            .unwrap_or_default();
        let mut page = ListPage::new(records).with_total(total);
        if end < filtered.len() {
            page = page.with_next_page_token((index + 1).to_string());
        }
        Ok(page)
    }

    fn create(&self, entity: &EntityType, payload: &Record) -> SyncResult<Record> {
        self.check_online()?;
        self.check_rejects(payload)?;
        let mut stored = payload.clone();
        stored.set(ID_FIELD, Value::Int(self.allocate_id()));
        self.tables
            .write()
            .entry(entity.remote_path().to_string())
            .or_default()
            .push(stored.clone());
        self.created
            .write()
            .push((entity.remote_path().to_string(), payload.clone()));
        Ok(stored)
    }

    fn update(&self, entity: &EntityType, id: i64, payload: &Record) -> SyncResult<Record> {
        self.check_online()?;
        self.check_rejects(payload)?;
        let mut tables = self.tables.write();
        let table = tables.entry(entity.remote_path().to_string()).or_default();
        let Some(stored) = table
            .iter_mut()
            .find(|r| r.get(ID_FIELD).and_then(Value::as_int) == Some(id))
        else {
            return Err(SyncError::validation(format!(
                "no record {id} in {}",
                entity.remote_path()
            )));
        };
        for (name, value) in payload.iter() {
            stored.set(name, value.clone());
        }
        let merged = stored.clone();
        drop(tables);
        self.updated
            .write()
            .push((entity.remote_path().to_string(), id, payload.clone()));
        Ok(merged)
    }

    fn find_by_natural_key(
        &self,
        entity: &EntityType,
        key: &Record,
    ) -> SyncResult<Option<Record>> {
        self.check_online()?;
        let found = self.records(entity).into_iter().find(|record| {
            key.iter().all(|(name, wanted)| {
                record.get(name).map(rendered_text) == Some(rendered_text(wanted))
            })
        });
        Ok(found)
    }
}

/// Renders a value the way it would appear as a query parameter.
fn rendered_text(value: &Value) -> String {
    match value {
        Value::Str(text) => text.clone(),
        other => other.to_string(),
    }
}

fn matches_filters(record: &Record, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(name, wanted)| {
        record
            .get(name)
            .map(rendered_text)
            .is_some_and(|text| text == *wanted)
    })
}

/// [`LoopbackServer`] serving [`MemoryRemote`] tables as a JSON REST API.
///
/// Pair it with [`coresync_engine::LoopbackClient`] and a host-only base
/// URL (for example `http://remote`) to drive [`coresync_engine::HttpRemoteStore`]
/// through the full encode/decode path without a network.
pub struct RestServer {
    registry: SchemaRegistry,
    remote: Arc<MemoryRemote>,
}

impl RestServer {
    /// Creates a server over `remote`, resolving paths through `registry`.
    #[must_use]
    pub fn new(registry: SchemaRegistry, remote: Arc<MemoryRemote>) -> Self {
        RestServer { registry, remote }
    }

    /// The backing remote, for seeding and assertions.
    #[must_use]
    pub fn remote(&self) -> &MemoryRemote {
        &self.remote
    }

    fn entity_for_path(&self, segment: &str) -> Option<&EntityType> {
        self.registry.iter().find(|e| e.remote_path() == segment)
    }
}

impl LoopbackServer for RestServer {
    fn handle(
        &self,
        method: &str,
        target: &str,
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(entity) = segments.first().and_then(|s| self.entity_for_path(s)) else {
            return Ok(detail_response(404, "unknown path"));
        };

        match (method, segments.len()) {
            ("GET", 1) => {
                let (pull, token) = parse_query(query);
                match self.remote.list(entity, &pull, token.as_deref()) {
                    Ok(page) => match page.encode() {
                        Ok(body) => Ok(HttpResponse::new(200, body)),
                        Err(e) => Ok(error_response(500, &e.to_string())),
                    },
                    Err(e) => error_to_response(e),
                }
            }
            ("POST", 1) => {
                let payload = match decode_body(body) {
                    Ok(payload) => payload,
                    Err(message) => return Ok(detail_response(400, &message)),
                };
                match self.remote.create(entity, &payload) {
                    Ok(stored) => Ok(HttpResponse::new(201, record_to_json(&stored).to_string())),
                    Err(e) => error_to_response(e),
                }
            }
            ("PATCH", 2) => {
                let Ok(id) = segments[1].parse::<i64>() else {
                    return Ok(detail_response(404, "bad id"));
                };
                let payload = match decode_body(body) {
                    Ok(payload) => payload,
                    Err(message) => return Ok(detail_response(400, &message)),
                };
                match self.remote.update(entity, id, &payload) {
                    Ok(stored) => Ok(HttpResponse::new(200, record_to_json(&stored).to_string())),
                    Err(e) => error_to_response(e),
                }
            }
            _ => Ok(detail_response(405, "method not allowed")),
        }
    }
}

fn decode_body(body: Option<&str>) -> Result<Record, String> {
    let body = body.ok_or_else(|| "missing body".to_string())?;
    record_from_body(body).map_err(|e| e.to_string())
}

/// Splits a query string into sync filters plus the page token. The
/// `page` and `page_size` parameters carry pagination; everything else
/// is an equality filter.
fn parse_query(query: &str) -> (PullQuery, Option<String>) {
    let mut pull = PullQuery::new();
    let mut token = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (decode_component(name), decode_component(value)),
            None => (decode_component(pair), String::new()),
        };
        match name.as_str() {
            "page" => token = Some(value),
            "page_size" => {
                if let Ok(size) = value.parse::<u32>() {
                    pull = pull.with_page_size(size);
                }
            }
            _ => pull = pull.with_filter(name, value),
        }
    }
    (pull, token)
}

/// Reverses the percent-encoding applied by the HTTP store.
fn decode_component(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let pair = (hex_digit(bytes[index + 1]), hex_digit(bytes[index + 2]));
            if let (Some(high), Some(low)) = pair {
                out.push(high << 4 | low);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn detail_response(status: u16, detail: &str) -> HttpResponse {
    HttpResponse::new(
        status,
        serde_json::json!({ "detail": detail }).to_string(),
    )
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    HttpResponse::new(
        status,
        serde_json::json!({ "error": message }).to_string(),
    )
}

/// Maps a fake-side failure onto the HTTP surface: rejected input becomes
/// a 400, a simulated dead connection becomes a client-level error, and
/// anything else turns into a 500.
fn error_to_response(error: SyncError) -> Result<HttpResponse, String> {
    match error {
        SyncError::Transport { message, .. } => Err(message),
        SyncError::Validation(message) => Ok(detail_response(400, &message)),
        other => Ok(error_response(500, &other.to_string())),
    }
}
