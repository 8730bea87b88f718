//! Content fingerprints over whole records.
//!
//! A fingerprint is the only record-equality test the sync engine uses:
//! two records are the same iff their fingerprints are equal. The hash
//! is computed over a canonical JSON rendering (excluded and null
//! fields dropped, every value canonicalized, keys sorted), so any
//! value-preserving re-serialization of a record hashes identically.
//! SHA-256 is used for its fixed width and ubiquity; adversarial
//! collision resistance is not required here.

use crate::canon::canonicalize;
use crate::error::{ValueError, ValueResult};
use crate::value::{Record, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Builds the canonical form of a record: excluded fields removed,
/// every value passed through [`canonicalize`], fields sorted by name.
///
/// Fields whose canonical value is null are dropped entirely. An absent
/// field, an explicit null and an empty string all mean "no value", and
/// listings are allowed to omit fields per record, so the three forms
/// must hash identically.
pub fn canonical_record(record: &Record, excluded: &BTreeSet<String>) -> Record {
    let mut pairs: Vec<(String, Value)> = record
        .iter()
        .filter(|(name, _)| !excluded.contains(*name))
        .filter_map(|(name, value)| {
            let canonical = canonicalize(value);
            if canonical.is_null() {
                None
            } else {
                Some((name.to_string(), canonical))
            }
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Record::from_pairs(pairs)
}

/// Canonicalizes a value and renders it as compact JSON.
pub fn to_canonical_json(value: &Value) -> ValueResult<String> {
    let canonical = canonicalize(value);
    serde_json::to_string(&canonical).map_err(|e| ValueError::encoding_failed(e.to_string()))
}

/// Computes the content hash of a record, as lowercase hex.
///
/// Fields named in `excluded` never participate: they are volatile
/// server bookkeeping and must not turn into spurious changes.
pub fn fingerprint(record: &Record, excluded: &BTreeSet<String>) -> ValueResult<String> {
    let canonical = canonical_record(record, excluded);
    let json =
        serde_json::to_string(&canonical).map_err(|e| ValueError::encoding_failed(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
