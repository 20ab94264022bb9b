//! Core error types.

use thiserror::Error;

use crate::storage::{RowKey, Version};

/// Core errors surfaced by every public operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Field values or keys do not conform to the catalog.
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Primary key collision on create.
    #[error("{entity} {key} already exists")]
    Uniqueness {
        /// Entity name.
        entity: String,
        /// Colliding key.
        key: RowKey,
    },

    /// The caller's version is stale, the row vanished since it was read, or
    /// a row a delete plan guards gained a new reference.
    #[error("version conflict on {entity} {key}: expected {expected}, found {}", found(.actual))]
    Conflict {
        /// Entity name.
        entity: String,
        /// Row key.
        key: RowKey,
        /// Version the caller held; the planned link stamp for a guard.
        expected: Version,
        /// Current value in the store, `None` if the row is gone.
        actual: Option<Version>,
    },

    /// RESTRICT violation or missing parent.
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(#[from] ReferentialError),

    /// Key absent where existence was assumed.
    #[error("{entity} {key} not found")]
    NotFound {
        /// Entity name.
        entity: String,
        /// Missing key.
        key: RowKey,
    },

    /// Startup-time registration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A catalog was already registered on this database.
    #[error("catalog already registered; registration is accepted once per database")]
    CatalogSealed,

    /// No catalog has been registered yet.
    #[error("no catalog registered")]
    CatalogNotRegistered,

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// I/O error while loading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn found(actual: &Option<Version>) -> String {
    match actual {
        Some(v) => v.to_string(),
        None => "no row".to_string(),
    }
}

impl Error {
    /// Whether this is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Whether this is a missing-row error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether this is a shape violation.
    pub fn is_shape(&self) -> bool {
        matches!(self, Error::Shape(_))
    }

    /// Whether this is a primary-key collision.
    pub fn is_uniqueness(&self) -> bool {
        matches!(self, Error::Uniqueness { .. })
    }

    /// Whether this is a referential integrity failure.
    pub fn is_referential(&self) -> bool {
        matches!(self, Error::ReferentialIntegrity(_))
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Field values that violate the catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("{entity} has no relation '{relation}'")]
    UnknownRelation { entity: String, relation: String },

    #[error("{entity}.{field} is required")]
    MissingField { entity: String, field: String },

    #[error("{entity}.{field} given more than once")]
    DuplicateField { entity: String, field: String },

    #[error("{entity}.{field} is not nullable")]
    NullNotAllowed { entity: String, field: String },

    #[error("{entity}.{field} expects {expected}, got {found}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("{entity}.{field}: '{value}' is not a declared representation")]
    UnknownEnumRepresentation {
        entity: String,
        field: String,
        value: String,
    },

    #[error("{entity}.{field}: '{member}' is not a declared member")]
    UnknownEnumMember {
        entity: String,
        field: String,
        member: String,
    },

    #[error("{entity}.{field} is the version field and is maintained by the store")]
    VersionFieldWrite { entity: String, field: String },

    #[error("{entity}.{field} is part of the primary key and cannot be updated")]
    KeyFieldUpdate { entity: String, field: String },

    #[error("{entity} key has {expected} component(s), got {found}")]
    KeyArity {
        entity: String,
        expected: usize,
        found: usize,
    },

    #[error("{entity}.{field}: sequence exhausted")]
    SequenceExhausted { entity: String, field: String },

    #[error("{entity}: stored row is corrupt: {detail}")]
    Corrupt { entity: String, detail: String },
}

/// Referential integrity failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReferentialError {
    /// A RESTRICT relation still has dependents.
    #[error(
        "cannot delete {entity} {key}: {blocking_entity} {blocking_key} still references it via '{relation}'"
    )]
    Restricted {
        relation: String,
        entity: String,
        key: RowKey,
        blocking_entity: String,
        blocking_key: RowKey,
    },

    /// A declared foreign key points at a row that does not exist.
    #[error("{entity} references missing {parent_entity} {parent_key} via '{relation}'")]
    MissingParent {
        relation: String,
        entity: String,
        parent_entity: String,
        parent_key: RowKey,
    },
}

/// Catalog and relation registration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid entity name '{0}'")]
    InvalidEntityName(String),

    #[error("entity '{0}' declared twice")]
    DuplicateEntity(String),

    #[error("{entity} declares field '{field}' twice")]
    DuplicateField { entity: String, field: String },

    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("{entity}: invalid primary key: {reason}")]
    InvalidPrimaryKey { entity: String, reason: String },

    #[error("{entity}.{field}: invalid auto_increment: {reason}")]
    AutoIncrement {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("{entity}.{field}: invalid default value")]
    InvalidDefault { entity: String, field: String },

    #[error("{entity}: invalid version field '{field}': {reason}")]
    InvalidVersionField {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("{entity}.{field}: enum value '{value}' declared twice")]
    DuplicateEnumValue {
        entity: String,
        field: String,
        value: String,
    },

    #[error("{entity}.{field}: enum declares no members")]
    EmptyEnum { entity: String, field: String },

    #[error("relation '{relation}' refers to unknown entity '{entity}'")]
    UnknownRelationEntity { relation: String, entity: String },

    #[error("relation '{relation}' refers to unknown field {entity}.{field}")]
    UnknownRelationField {
        relation: String,
        entity: String,
        field: String,
    },

    #[error("relation '{relation}' declares no join fields")]
    EmptyJoin { relation: String },

    #[error("relation '{relation}': {parent_field} and {child_field} have incompatible types")]
    JoinTypeMismatch {
        relation: String,
        parent_field: String,
        child_field: String,
    },

    #[error("relation '{relation}': foreign key must reference the primary key of '{parent}'")]
    ForeignKeyNotPrimary { relation: String, parent: String },

    #[error("relation '{relation}': one-to-one foreign key must be the primary key of '{child}'")]
    OneToOneNotUnique { relation: String, child: String },

    #[error("relation '{relation}' has no on-delete policy")]
    MissingDeletePolicy { relation: String },

    #[error("{entity} already has a field or relation named '{name}'")]
    DuplicateRelation { entity: String, name: String },

    #[error("cascade cycle: {}", .path.join(" -> "))]
    CascadeCycle { path: Vec<String> },

    #[error("schema fingerprint {registered} does not match the store's {stored}")]
    FingerprintMismatch { stored: String, registered: String },

    #[error("invalid configuration: {0}")]
    Parse(String),
}
