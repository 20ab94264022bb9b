//! Foreign-key validation on write.
//!
//! Only relations declared as foreign keys are enforced here. Custom-join
//! relations are application-level and never block a write.

use ormguard_proto::Value;

use crate::catalog::{Catalog, RelationGraph};
use crate::error::{Error, ReferentialError};
use crate::query::related;
use crate::storage::{RowKey, RowStore};

/// A parent row a validated child references.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRef {
    /// Relation the reference goes through.
    pub relation: String,
    /// Parent entity.
    pub entity: String,
    /// Parent key.
    pub key: RowKey,
}

/// Checks that the parents a child row references exist.
pub struct ForeignKeyValidator<'a> {
    store: &'a dyn RowStore,
    catalog: &'a Catalog,
    graph: &'a RelationGraph,
}

impl<'a> ForeignKeyValidator<'a> {
    /// Create a new validator.
    pub fn new(store: &'a dyn RowStore, catalog: &'a Catalog, graph: &'a RelationGraph) -> Self {
        Self {
            store,
            catalog,
            graph,
        }
    }

    /// Validate a full row of `entity`.
    ///
    /// `pending` lists rows inserted earlier in the same batch; they count
    /// as existing parents. When `changed` is given, only foreign keys
    /// touching one of those fields are checked.
    ///
    /// Returns the parents found, so the write can link them in the same
    /// batch and a concurrent delete of a parent sees the new reference.
    pub fn validate(
        &self,
        entity: &str,
        fields: &[(String, Value)],
        changed: Option<&[(String, Value)]>,
        pending: &[(String, RowKey)],
    ) -> Result<Vec<ParentRef>, Error> {
        let mut parents = Vec::new();
        for edge in self.graph.foreign_keys(entity) {
            if let Some(changed) = changed {
                let touched = edge
                    .source_fields
                    .iter()
                    .any(|f| changed.iter().any(|(name, _)| name == f));
                if !touched {
                    continue;
                }
            }

            // A null component means the row references nothing.
            let Some(values) = related::join_values(edge, fields) else {
                continue;
            };

            let found: Vec<RowKey> = match related::point_key(self.catalog, edge, &values)? {
                Some(key) => {
                    let exists = pending.iter().any(|(e, k)| e == &edge.target && k == &key)
                        || self.store.get(&edge.target, &key)?.is_some();
                    if exists {
                        vec![key]
                    } else {
                        Vec::new()
                    }
                }
                None => related::find(self.store, self.catalog, edge, &values)?
                    .into_iter()
                    .map(|row| row.key)
                    .collect(),
            };

            if found.is_empty() {
                return Err(ReferentialError::MissingParent {
                    relation: edge.relation.clone(),
                    entity: entity.to_string(),
                    parent_entity: edge.target.clone(),
                    parent_key: RowKey::new(values),
                }
                .into());
            }
            parents.extend(found.into_iter().map(|key| ParentRef {
                relation: edge.relation.clone(),
                entity: edge.target.clone(),
                key,
            }));
        }
        Ok(parents)
    }
}
