//! Decoded rows returned to callers.

use ormguard_proto::Value;

use crate::catalog::Catalog;
use crate::error::Error;
use crate::storage::{RowKey, StoredRow, Version};

/// A row in caller form.
///
/// Enum fields carry their internal member and the entity's version field,
/// if declared, mirrors `version` as a timestamp. `related` is only filled
/// for relations requested through [`Fetch::include`](super::Fetch::include).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Entity name.
    pub entity: String,
    /// Primary key.
    pub key: RowKey,
    /// Version token at read time.
    pub version: Version,
    /// Field values in declaration order.
    pub fields: Vec<(String, Value)>,
    /// Eagerly loaded relations, by edge name.
    pub related: Vec<(String, Vec<Row>)>,
}

impl Row {
    pub(crate) fn decode(catalog: &Catalog, entity: &str, stored: &StoredRow) -> Result<Self, Error> {
        Ok(Self {
            entity: entity.to_string(),
            key: stored.key.clone(),
            version: stored.version,
            fields: catalog.decode_row(entity, stored)?,
            related: Vec::new(),
        })
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Rows loaded for an included relation.
    pub fn related(&self, name: &str) -> Option<&[Row]> {
        self.related
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.as_slice())
    }
}
