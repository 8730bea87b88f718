//! HTTP binding for [`RemoteStore`].
//!
//! The engine stays transport-agnostic: [`HttpClient`] is the only surface a
//! real HTTP stack has to implement, and [`LoopbackClient`] routes requests
//! to an in-process [`LoopbackServer`] for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use coresync_protocol::{
    record_from_body, record_to_json, remote_error_message, ListPage, PullQuery,
};
use coresync_schema::EntityType;
use coresync_value::{Record, Value};

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;

/// HTTP method used by a [`HttpRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Fetch a resource.
    Get,
    /// Create a resource.
    Post,
    /// Partially update a resource.
    Patch,
}

impl HttpMethod {
    /// Returns the method name as used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// A single request handed to a [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute URL including the query string.
    pub url: String,
    /// JSON body for POST and PATCH requests.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    /// Creates a POST request with a JSON body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        HttpRequest {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body.into()),
        }
    }

    /// Creates a PATCH request with a JSON body.
    #[must_use]
    pub fn patch(url: impl Into<String>, body: impl Into<String>) -> Self {
        HttpRequest {
            method: HttpMethod::Patch,
            url: url.into(),
            body: Some(body.into()),
        }
    }
}

/// A raw response as seen by the engine.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP client abstraction.
///
/// Implementations wrap whatever HTTP stack the host application uses. An
/// `Err` means the request never produced a response (DNS failure, refused
/// connection, timeout); protocol-level failures come back as a response
/// with the corresponding status code.
pub trait HttpClient: Send + Sync {
    /// Executes a request.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;

    /// Returns true if the client believes the remote is reachable.
    fn is_healthy(&self) -> bool;
}

/// [`RemoteStore`] speaking JSON over HTTP.
///
/// URLs follow the collection/detail convention of the remote API:
/// `{base}/{path}/` lists and creates, `{base}/{path}/{id}/` updates.
pub struct HttpRemoteStore<C: HttpClient> {
    client: C,
    base_url: String,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteStore<C> {
    /// Creates a store rooted at `base_url`.
    #[must_use]
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpRemoteStore {
            client,
            base_url,
            connected: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    /// Returns true once a request has completed against the remote.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Returns the most recent transport failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn collection_url(&self, entity: &EntityType, params: &[(String, String)]) -> String {
        let mut url = format!("{}/{}/", self.base_url, entity.remote_path());
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_query(params));
        }
        url
    }

    fn detail_url(&self, entity: &EntityType, id: i64) -> String {
        format!("{}/{}/{}/", self.base_url, entity.remote_path(), id)
    }

    fn execute(&self, request: &HttpRequest) -> SyncResult<HttpResponse> {
        let response = match self.client.send(request) {
            Ok(response) => response,
            Err(message) => {
                self.connected.store(false, Ordering::Relaxed);
                *self.last_error.write() = Some(message.clone());
                return Err(SyncError::transport_retryable(message));
            }
        };
        self.connected.store(true, Ordering::Relaxed);
        if response.is_success() {
            *self.last_error.write() = None;
            return Ok(response);
        }
        let detail = remote_error_message(&response.body);
        match response.status {
            500..=599 => Err(SyncError::remote(format!(
                "status {}: {detail}",
                response.status
            ))),
            400..=499 => Err(SyncError::validation(detail)),
            status => Err(SyncError::transport_fatal(format!(
                "unexpected status {status}"
            ))),
        }
    }
}

impl<C: HttpClient> RemoteStore for HttpRemoteStore<C> {
    fn list(
        &self,
        entity: &EntityType,
        query: &PullQuery,
        page_token: Option<&str>,
    ) -> SyncResult<ListPage> {
        let params = query.query_params(page_token);
        let request = HttpRequest::get(self.collection_url(entity, &params));
        let response = self.execute(&request)?;
        Ok(ListPage::decode(&response.body)?)
    }

    fn create(&self, entity: &EntityType, payload: &Record) -> SyncResult<Record> {
        let body = record_to_json(payload).to_string();
        let request = HttpRequest::post(self.collection_url(entity, &[]), body);
        let response = self.execute(&request)?;
        Ok(record_from_body(&response.body)?)
    }

    fn update(&self, entity: &EntityType, id: i64, payload: &Record) -> SyncResult<Record> {
        let body = record_to_json(payload).to_string();
        let request = HttpRequest::patch(self.detail_url(entity, id), body);
        let response = self.execute(&request)?;
        Ok(record_from_body(&response.body)?)
    }

    fn find_by_natural_key(
        &self,
        entity: &EntityType,
        key: &Record,
    ) -> SyncResult<Option<Record>> {
        let params: Vec<(String, String)> = key
            .iter()
            .map(|(name, value)| (name.to_string(), param_text(value)))
            .collect();
        let request = HttpRequest::get(self.collection_url(entity, &params));
        let response = self.execute(&request)?;
        let page = ListPage::decode(&response.body)?;
        Ok(page.records.into_iter().next())
    }
}

/// Renders a value as a query parameter.
fn param_text(value: &Value) -> String {
    match value {
        Value::Str(text) => text.clone(),
        other => other.to_string(),
    }
}

fn encode_query(params: &[(String, String)]) -> String {
    let mut out = String::new();
    for (index, (name, value)) in params.iter().enumerate() {
        if index > 0 {
            out.push('&');
        }
        out.push_str(&encode_component(name));
        out.push('=');
        out.push_str(&encode_component(value));
    }
    out
}

/// Percent-encodes everything outside the URL-unreserved set.
fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

/// In-process server for loopback tests.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request. `target` is the path plus query string.
    fn handle(&self, method: &str, target: &str, body: Option<&str>)
        -> Result<HttpResponse, String>;
}

/// [`HttpClient`] that routes requests straight to a [`LoopbackServer`].
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a client wrapping `server`.
    #[must_use]
    pub fn new(server: Arc<S>) -> Self {
        LoopbackClient { server }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let target = strip_origin(&request.url);
        self.server
            .handle(request.method.as_str(), target, request.body.as_deref())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Drops `scheme://host` from an absolute URL, keeping path and query.
fn strip_origin(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(index) => &url[index + 3..],
        None => url,
    };
    match after_scheme.find('/') {
        Some(index) => &after_scheme[index..],
        None => "/",
    }
}
