//! Error types for catalog validation.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while building a [`crate::SchemaRegistry`].
///
/// The catalog is fixed at startup, so every variant here is a
/// programming error in the catalog definition, not a runtime
/// condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two entity types share a name.
    #[error("duplicate entity type: {name}")]
    DuplicateEntity {
        /// The repeated entity type name.
        name: String,
    },

    /// Two fields within one entity type share a name.
    #[error("duplicate field {field} in entity type {entity}")]
    DuplicateField {
        /// The entity type containing the duplicate.
        entity: String,
        /// The repeated field name.
        field: String,
    },

    /// A natural-key field does not exist in the entity's field list.
    #[error("natural-key field {field} not defined on entity type {entity}")]
    UnknownNaturalKeyField {
        /// The entity type naming the field.
        entity: String,
        /// The missing field name.
        field: String,
    },

    /// An entity type has an empty name or remote path.
    #[error("invalid entity type definition: {message}")]
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },
}

impl SchemaError {
    /// Creates a duplicate entity error.
    pub fn duplicate_entity(name: impl Into<String>) -> Self {
        Self::DuplicateEntity { name: name.into() }
    }

    /// Creates a duplicate field error.
    pub fn duplicate_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::DuplicateField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an unknown natural-key field error.
    pub fn unknown_natural_key_field(
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::UnknownNaturalKeyField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid definition error.
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }
}
