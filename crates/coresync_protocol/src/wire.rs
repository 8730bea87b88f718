//! Record ⇄ JSON conversions and remote error bodies.

use crate::error::{WireError, WireResult};
use coresync_value::{from_json, to_json, Record, Value};

/// Converts one JSON object into a [`Record`], preserving key order.
pub fn record_from_json(json: &serde_json::Value) -> WireResult<Record> {
    match from_json(json) {
        Value::Map(pairs) => Ok(Record::from_pairs(pairs)),
        other => Err(WireError::invalid_structure(format!(
            "expected object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parses a JSON body holding a single record.
pub fn record_from_body(body: &str) -> WireResult<Record> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|err| WireError::invalid_json(err.to_string()))?;
    record_from_json(&json)
}

/// Converts a JSON array of objects into records.
pub fn records_from_json(json: &serde_json::Value) -> WireResult<Vec<Record>> {
    let items = json
        .as_array()
        .ok_or_else(|| WireError::invalid_structure("expected array of records"))?;
    items.iter().map(record_from_json).collect()
}

/// Renders a record as a JSON object, geometry as EWKT text.
pub fn record_to_json(record: &Record) -> serde_json::Value {
    let mut object = serde_json::Map::with_capacity(record.len());
    for (name, value) in record.iter() {
        object.insert(name.to_string(), to_json(value));
    }
    serde_json::Value::Object(object)
}

/// Extracts a human-readable message from a remote error body.
///
/// Accepts the usual REST spellings (`detail`, `message`, `error`) and
/// falls back to the whole body text, so a push error always carries
/// something the caller can show verbatim.
pub fn remote_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            if let Some(text) = json.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
        // Field-keyed validation maps come back verbatim.
        if json.is_object() || json.is_array() {
            return json.to_string();
        }
    }
    body.to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Int(_) | Value::Float(_) => "number",
        Value::Str(_) => "string",
        Value::Geometry(_) => "geometry",
        Value::List(_) => "array",
        Value::Map(_) => "object",
    }
}
