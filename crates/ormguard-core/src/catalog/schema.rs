//! Schema bundle - the full set of declarations registered at startup.

use rkyv::{Archive, Deserialize, Serialize};

use super::{EntityDef, RelationDef};
use crate::error::Error;

/// Every entity and relation a database is opened with.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Entity definitions, in declaration order.
    pub entities: Vec<EntityDef>,
    /// Relation definitions, in declaration order.
    pub relations: Vec<RelationDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Add a relation to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Stable content hash of the schema, hex encoded.
    ///
    /// Entities and relations are sorted by name first, so declaration
    /// order does not change the fingerprint.
    pub fn fingerprint(&self) -> Result<String, Error> {
        let mut canonical = self.clone();
        canonical.entities.sort_by(|a, b| a.name.cmp(&b.name));
        canonical.relations.sort_by(|a, b| a.name.cmp(&b.name));
        let bytes = canonical.to_bytes()?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}
