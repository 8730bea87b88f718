//! Property-based generators.
//!
//! Strategies for random field names, values and records that stay
//! inside the engine's domain: finite floats, printable text, unique
//! field names per record.

use coresync_value::{Geometry, Record, Value};
use proptest::prelude::*;

/// Strategy for lowercase snake_case field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("valid regex")
}

/// Strategy for scalar field values: null, booleans, integers, finite
/// floats and printable text.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        prop::string::string_regex("\\PC{0,24}")
            .expect("valid regex")
            .prop_map(Value::Str),
    ]
}

/// Strategy for arbitrary values, including nested lists and maps.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(|map| Value::Map(map.into_iter().collect())),
        ]
    })
}

/// Strategy for records with up to `max_fields` uniquely named scalar
/// fields.
pub fn record_strategy(max_fields: usize) -> impl Strategy<Value = Record> {
    prop::collection::btree_map(field_name_strategy(), scalar_value_strategy(), 0..max_fields)
        .prop_map(|fields| Record::from_pairs(fields.into_iter().collect()))
}

/// Strategy for 2D points in lon/lat range, SRID 4326.
pub fn point_strategy() -> impl Strategy<Value = Geometry> {
    ((-180.0..180.0f64), (-90.0..90.0f64))
        .prop_map(|(x, y)| Geometry::point(x, y, Some(4326)))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coresync_protocol::{record_from_body, record_to_json};
    use coresync_value::{canonicalize, fingerprint};
    use std::collections::BTreeSet;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn field_names_are_identifiers(name in field_name_strategy()) {
            let mut chars = name.chars();
            prop_assert!(chars.next().is_some_and(|c| c.is_ascii_lowercase()));
            prop_assert!(chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }

        #[test]
        fn canonicalization_is_idempotent(value in value_strategy()) {
            let once = canonicalize(&value);
            let twice = canonicalize(&once);
            prop_assert_eq!(twice, once);
        }

        #[test]
        fn fingerprints_ignore_field_order(record in record_strategy(6)) {
            let excluded = BTreeSet::new();
            let reversed = Record::from_pairs(
                record.clone().into_pairs().into_iter().rev().collect(),
            );
            prop_assert_eq!(
                fingerprint(&record, &excluded).unwrap(),
                fingerprint(&reversed, &excluded).unwrap()
            );
        }

        #[test]
        fn wire_round_trip_preserves_identity(record in record_strategy(6)) {
            let excluded = BTreeSet::new();
            let body = record_to_json(&record).to_string();
            let decoded = record_from_body(&body).unwrap();
            prop_assert_eq!(
                fingerprint(&decoded, &excluded).unwrap(),
                fingerprint(&record, &excluded).unwrap()
            );
        }

        #[test]
        fn generated_points_parse_back(point in point_strategy()) {
            let parsed = Geometry::parse(&point.ewkt()).unwrap();
            prop_assert_eq!(parsed.ewkt(), point.ewkt());
        }
    }
}
