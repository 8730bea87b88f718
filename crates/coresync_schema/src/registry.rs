//! Read-only entity type lookup, built once from a fixed catalog.

use crate::error::{SchemaError, SchemaResult};
use crate::types::{EntityType, FieldSchema, GEOMETRY_FIELD, ID_FIELD};
use coresync_value::{canonicalize, Record};
use std::collections::{BTreeMap, BTreeSet};

/// Field names excluded from fingerprinting and push payloads by
/// default: server-side audit stamps, computed aggregates, and
/// synthetic display columns. A registry may extend this set, never
/// shrink it at runtime.
pub const DEFAULT_EXCLUDED_FIELDS: [&str; 6] = [
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "display_name",
    "record_count",
];

/// Field names whose string values get unlimited length when a schema
/// is inferred from pulled data.
pub const LONG_TEXT_FIELDS: [&str; 4] = ["description", "notes", "comments", "remarks"];

/// Static `name -> EntityType` lookup with the excluded-field set.
///
/// Populated at process start and read-only afterwards. Construction
/// validates the catalog; lookups never fail, they return `None`.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: BTreeMap<String, EntityType>,
    excluded: BTreeSet<String>,
}

impl SchemaRegistry {
    /// Builds a registry from a catalog of entity types.
    ///
    /// Rejects duplicate entity names, duplicate field names within a
    /// type, natural-key fields that are not defined on the type, and
    /// empty names or remote paths.
    pub fn new(catalog: Vec<EntityType>) -> SchemaResult<Self> {
        let mut types = BTreeMap::new();
        for entity in catalog {
            if entity.name().is_empty() {
                return Err(SchemaError::invalid_definition("entity type name is empty"));
            }
            if entity.remote_path().is_empty() {
                return Err(SchemaError::invalid_definition(format!(
                    "entity type {} has an empty remote path",
                    entity.name()
                )));
            }
            let mut seen = BTreeSet::new();
            for field in entity.fields() {
                if !seen.insert(field.name()) {
                    return Err(SchemaError::duplicate_field(entity.name(), field.name()));
                }
            }
            for key_field in entity.natural_key_fields() {
                if entity.field(key_field).is_none() {
                    return Err(SchemaError::unknown_natural_key_field(
                        entity.name(),
                        key_field,
                    ));
                }
            }
            if types.contains_key(entity.name()) {
                return Err(SchemaError::duplicate_entity(entity.name()));
            }
            types.insert(entity.name().to_string(), entity);
        }
        Ok(Self {
            types,
            excluded: DEFAULT_EXCLUDED_FIELDS.iter().map(ToString::to_string).collect(),
        })
    }

    /// Extends the excluded-field set with catalog-specific names.
    #[must_use]
    pub fn with_excluded_fields<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(extra.into_iter().map(Into::into));
        self
    }

    /// Looks up an entity type by name.
    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// Iterates entity types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The excluded-field set: names stripped before fingerprinting
    /// and never pushed.
    pub fn excluded_fields(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// All non-readonly fields of an entity type.
    pub fn writable_fields<'a>(&self, entity: &'a EntityType) -> Vec<&'a FieldSchema> {
        entity.writable_fields()
    }

    /// Projects a record down to a payload-ready form: writable fields
    /// plus the geometry field when the type carries geometry.
    ///
    /// The identity field is always removed, whatever the input held.
    /// Identity for an update travels in the request target, never in
    /// payload content, so a desynced local id can never overwrite the
    /// wrong remote record. Unknown fields are silently dropped.
    pub fn filter_for_push(&self, entity: &EntityType, record: &Record) -> Record {
        let writable: BTreeSet<&str> = entity
            .writable_fields()
            .iter()
            .map(|field| field.name())
            .collect();
        let mut payload = Record::with_capacity(record.len());
        for (name, value) in record.iter() {
            if name == ID_FIELD || self.excluded.contains(name) {
                continue;
            }
            if writable.contains(name) || (entity.has_geometry() && name == GEOMETRY_FIELD) {
                payload.set(name, value.clone());
            }
        }
        payload
    }

    /// Projects the natural key out of a record.
    ///
    /// Returns `None` when the type declares no natural key, or when
    /// any key field is missing or canonically null; a partial key
    /// must never match the wrong remote record.
    pub fn natural_key(&self, entity: &EntityType, record: &Record) -> Option<Record> {
        let fields = entity.natural_key_fields();
        if fields.is_empty() {
            return None;
        }
        let mut key = Record::with_capacity(fields.len());
        for name in fields {
            let value = record.get(name)?;
            if canonicalize(value).is_null() {
                return None;
            }
            key.set(name.clone(), value.clone());
        }
        Some(key)
    }
}
