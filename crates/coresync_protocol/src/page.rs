//! One page of a remote listing.

use crate::error::{WireError, WireResult};
use crate::wire::{record_from_json, record_to_json};
use coresync_value::Record;

const RESULTS_KEY: &str = "results";
const NEXT_KEY: &str = "next";
const COUNT_KEY: &str = "count";

/// A page of records plus the token for the next page.
///
/// Mirrors the common REST listing envelope:
/// `{"results": [...], "next": <token|null>, "count": <total>}`.
/// A missing or null `next` marks the last page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListPage {
    /// Records on this page, in server order.
    pub records: Vec<Record>,
    /// Opaque token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
    /// Total record count across all pages, when the server reports it.
    pub total: Option<u64>,
}

impl ListPage {
    /// Creates a final page holding the given records.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            next_page_token: None,
            total: None,
        }
    }

    /// Sets the next-page token.
    #[must_use]
    pub fn with_next_page_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }

    /// Sets the reported total count.
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Returns true when no further pages follow.
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }

    /// Decodes a page from a JSON body.
    ///
    /// A bare JSON array is accepted as a single, final page; some
    /// endpoints skip the envelope when everything fits in one
    /// response.
    pub fn decode(body: &str) -> WireResult<Self> {
        let json: serde_json::Value =
            serde_json::from_str(body).map_err(|e| WireError::invalid_json(e.to_string()))?;

        if let serde_json::Value::Array(items) = &json {
            let records = items
                .iter()
                .map(record_from_json)
                .collect::<WireResult<Vec<Record>>>()?;
            return Ok(Self::new(records));
        }

        let object = json
            .as_object()
            .ok_or_else(|| WireError::invalid_structure("listing is neither object nor array"))?;
        let results = object
            .get(RESULTS_KEY)
            .and_then(|v| v.as_array())
            .ok_or_else(|| WireError::invalid_structure("listing has no results array"))?;
        let records = results
            .iter()
            .map(record_from_json)
            .collect::<WireResult<Vec<Record>>>()?;

        let next_page_token = match object.get(NEXT_KEY) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(token)) => Some(token.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(WireError::invalid_structure(format!(
                    "unexpected next token: {other}"
                )))
            }
        };
        let total = object.get(COUNT_KEY).and_then(serde_json::Value::as_u64);

        Ok(Self {
            records,
            next_page_token,
            total,
        })
    }

    /// Encodes the page into the listing envelope.
    pub fn encode(&self) -> WireResult<String> {
        let mut object = serde_json::Map::new();
        object.insert(
            RESULTS_KEY.to_string(),
            serde_json::Value::Array(self.records.iter().map(record_to_json).collect()),
        );
        object.insert(
            NEXT_KEY.to_string(),
            match &self.next_page_token {
                Some(token) => serde_json::Value::String(token.clone()),
                None => serde_json::Value::Null,
            },
        );
        if let Some(total) = self.total {
            object.insert(COUNT_KEY.to_string(), serde_json::Value::from(total));
        }
        serde_json::to_string(&serde_json::Value::Object(object))
            .map_err(|e| WireError::invalid_json(e.to_string()))
    }
}
