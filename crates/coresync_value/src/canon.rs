//! Value canonicalization.
//!
//! [`canonicalize`] maps a raw field value of unknown shape onto one
//! deterministic representative, so that two values which are "the
//! same" across a pull/edit/re-display round trip compare equal. The
//! rules, applied in order:
//!
//! 1. `null`, the empty string, and the literal `"NULL"` are one
//!    canonical null.
//! 2. Booleans become the lowercase strings `"true"` / `"false"`
//!    (transports do not reliably preserve boolean type).
//! 3. Geometry-shaped strings lose their `SRID=` prefix and are
//!    re-rendered in canonical WKT (coordinates rounded to six decimal
//!    places, single-space tokens, uppercase keywords).
//! 4. ISO-8601-looking datetimes re-render as `YYYY-MM-DD HH:MM:SS`,
//!    dropping sub-second precision and the offset suffix.
//! 5. Strings holding a serialized object or array are parsed (JSON
//!    first, then a permissive single-quote literal form) and the
//!    parsed structure is canonicalized instead.
//! 6. Maps sort their keys and canonicalize recursively; lists keep
//!    order and canonicalize elementwise.
//! 7. Floats round to six decimal places; an integral result collapses
//!    to an integer, and non-finite values collapse to null.
//! 8. Everything else passes through unchanged.
//!
//! Canonicalization never fails. When a parse is ambiguous the value
//! degrades to its literal form, trading a false "changed" for never
//! hiding a real change.

use crate::geometry::Geometry;
use crate::value::{from_json, Value};
use chrono::NaiveDateTime;

/// Largest magnitude at which every integer is exactly representable
/// in an `f64`. Integral floats beyond it stay floats.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Above this magnitude the float grid is already coarser than 1e-6,
/// so rounding would only overflow the intermediate product.
const ROUND_LIMIT: f64 = MAX_EXACT_INT / 1e6;

/// Rounds a float to six decimal places. Non-finite values and
/// magnitudes beyond the rounding limit pass through unchanged.
pub fn round6(value: f64) -> f64 {
    if !value.is_finite() || value.abs() >= ROUND_LIMIT {
        return value;
    }
    (value * 1e6).round() / 1e6
}

/// Canonicalizes one value. Pure and total; see the module rules.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Str(if *b { "true" } else { "false" }.to_string()),
        Value::Int(n) => Value::Int(*n),
        Value::Float(x) => canonical_float(*x),
        Value::Str(s) => canonical_string(s),
        Value::Geometry(g) => Value::Str(g.wkt().to_string()),
        Value::List(items) => Value::List(items.iter().map(canonicalize).collect()),
        Value::Map(pairs) => {
            let mut canonical: Vec<(String, Value)> = pairs
                .iter()
                .map(|(key, value)| (key.clone(), canonicalize(value)))
                .collect();
            canonical.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Map(canonical)
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn canonical_float(x: f64) -> Value {
    if !x.is_finite() {
        return Value::Null;
    }
    let rounded = round6(x);
    if rounded.fract() == 0.0 && rounded.abs() <= MAX_EXACT_INT {
        Value::Int(rounded as i64)
    } else {
        Value::Float(rounded)
    }
}

fn canonical_string(s: &str) -> Value {
    if s.is_empty() || s == "NULL" {
        return Value::Null;
    }
    if Geometry::looks_like(s) {
        if let Some(geometry) = Geometry::parse(s) {
            return Value::Str(geometry.wkt().to_string());
        }
        return Value::Str(s.to_string());
    }
    if let Some(datetime) = canonical_datetime(s) {
        return Value::Str(datetime);
    }
    let trimmed = s.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Some(parsed) = parse_structure(s) {
            return canonicalize(&from_json(&parsed));
        }
    }
    Value::Str(s.to_string())
}

/// Re-renders an ISO-8601-looking datetime as `YYYY-MM-DD HH:MM:SS`.
///
/// The offset suffix is dropped rather than applied: `10:30:00Z` and
/// `10:30:00+00:00` both canonicalize to the same wall-clock text.
/// Returns `None` for anything that does not parse, so callers keep
/// the original string.
pub fn canonical_datetime(text: &str) -> Option<String> {
    let text = text.trim();
    if !looks_like_datetime(text) {
        return None;
    }
    let naive = chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| {
            chrono::DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z")
                .map(|dt| dt.naive_local())
        })
        .ok()?;
    Some(naive.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn looks_like_datetime(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 14 && bytes[4] == b'-' && text.contains(':')
}

fn parse_structure(text: &str) -> Option<serde_json::Value> {
    if let Ok(parsed) = serde_json::from_str(text) {
        return match parsed {
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => Some(parsed),
            _ => None,
        };
    }
    let rewritten = literal_to_json(text)?;
    match serde_json::from_str(&rewritten).ok()? {
        parsed @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => Some(parsed),
        _ => None,
    }
}

/// Rewrites a single-quoted dict/list literal (the textual form some
/// dynamic transports emit) into JSON. Returns `None` on any token
/// that JSON cannot carry.
fn literal_to_json(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                out.push('"');
                loop {
                    match chars.next()? {
                        '\\' => match chars.next()? {
                            '\'' => out.push('\''),
                            other => {
                                out.push('\\');
                                out.push(other);
                            }
                        },
                        '"' => out.push_str("\\\""),
                        '\'' => {
                            out.push('"');
                            break;
                        }
                        other => out.push(other),
                    }
                }
            }
            '"' => {
                out.push('"');
                let mut escaped = false;
                loop {
                    let c = chars.next()?;
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                word.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphabetic() {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" | "true" => out.push_str("true"),
                    "False" | "false" => out.push_str("false"),
                    "None" | "null" | "NaN" => out.push_str("null"),
                    _ => return None,
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}
