//! Entity definitions.

use rkyv::{Archive, Deserialize, Serialize};

use super::field::FieldDef;

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Primary key field names, in key order.
    pub primary_key: Vec<String>,
    /// Field definitions.
    pub fields: Vec<FieldDef>,
    /// Name under which the row version is exposed as a timestamp.
    pub version_field: Option<String>,
}

impl EntityDef {
    /// Create an entity with a single-field primary key.
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: vec![key_field.into()],
            fields: Vec::new(),
            version_field: None,
        }
    }

    /// Create an entity whose identity is the tuple of `key_fields`.
    pub fn with_composite_key<I, S>(name: impl Into<String>, key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            primary_key: key_fields.into_iter().map(Into::into).collect(),
            fields: Vec::new(),
            version_field: None,
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Expose the row version under `name`.
    pub fn with_version_field(mut self, name: impl Into<String>) -> Self {
        self.version_field = Some(name.into());
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a field is part of the primary key.
    pub fn is_key_field(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }

    /// Check whether `name` is the version field.
    pub fn is_version_field(&self, name: &str) -> bool {
        self.version_field.as_deref() == Some(name)
    }

    /// The auto-increment field, if any.
    pub fn auto_increment_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.auto_increment)
    }
}
