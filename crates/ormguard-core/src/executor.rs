//! CRUD executor.
//!
//! The executor ties the catalog, the relationship graph, the optimistic
//! concurrency controller and the delete planner together. Every write is
//! turned into a single [`WriteBatch`] and applied atomically; either all
//! of its effects land or none do.
//!
//! No lock is held between reading and writing. Checks made while building
//! a batch are repeated by the store inside the batch: version checks on
//! updates and deletes, `link` ops on every parent a write references, and
//! `guard` ops on every row a delete plan removes. Executors over the same
//! store, in this process or another `Database` handle, stay consistent.

use std::sync::Arc;

use ormguard_proto::{Filter, Value};
use tracing::debug;

use crate::catalog::{Catalog, FieldType, RelationGraph, ScalarType};
use crate::constraint::{DeletePlan, DeletePlanner, ForeignKeyValidator, ParentRef, RemovedRow};
use crate::error::{Error, ShapeError};
use crate::occ::OptimisticController;
use crate::query::{related, Fetch, Row};
use crate::storage::{RowKey, RowStore, Version, WriteBatch};

/// Entry point for reads and writes against a registered schema.
///
/// Cheap to clone; clones share the store and schema.
#[derive(Clone)]
pub struct CrudExecutor {
    store: Arc<dyn RowStore>,
    catalog: Arc<Catalog>,
    graph: Arc<RelationGraph>,
}

impl CrudExecutor {
    pub(crate) fn new(store: Arc<dyn RowStore>, catalog: Arc<Catalog>, graph: Arc<RelationGraph>) -> Self {
        Self {
            store,
            catalog,
            graph,
        }
    }

    /// The registered catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The registered relationship graph.
    pub fn graph(&self) -> &RelationGraph {
        &self.graph
    }

    pub(crate) fn store(&self) -> &dyn RowStore {
        self.store.as_ref()
    }

    /// Insert one row and return its key.
    pub fn create(&self, entity: &str, fields: Vec<(String, Value)>) -> Result<RowKey, Error> {
        let (key, fields) = self.prepare_insert(entity, fields)?;
        let parents = self.validator().validate(entity, &fields, None, &[])?;

        let mut batch = WriteBatch::new();
        batch.insert(entity, key.clone(), fields);
        link_parents(&mut batch, entity, parents);
        let version = self.store.apply(&batch)?[0];

        debug!(entity, key = %key, version = %version, "created row");
        Ok(key)
    }

    /// Insert several rows of one entity as a single atomic batch.
    ///
    /// Rows may reference parents inserted earlier in the same call.
    pub fn create_many(&self, entity: &str, rows: Vec<Vec<(String, Value)>>) -> Result<Vec<RowKey>, Error> {
        let validator = self.validator();
        let mut batch = WriteBatch::new();
        let mut pending: Vec<(String, RowKey)> = Vec::with_capacity(rows.len());

        for fields in rows {
            let (key, fields) = self.prepare_insert(entity, fields)?;
            let parents = validator.validate(entity, &fields, None, &pending)?;
            batch.insert(entity, key.clone(), fields);
            link_parents(&mut batch, entity, parents);
            pending.push((entity.to_string(), key));
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        self.store.apply(&batch)?;
        debug!(entity, rows = pending.len(), "created rows");
        Ok(pending.into_iter().map(|(_, key)| key).collect())
    }

    /// Point read returning the row and the version a write must present.
    pub fn read(&self, entity: &str, key: impl Into<RowKey>) -> Result<(Row, Version), Error> {
        let key = self.catalog.normalize_key(entity, key.into())?;
        let stored = OptimisticController::new(self.store()).read(entity, &key)?;
        let row = Row::decode(&self.catalog, entity, &stored)?;
        Ok((row, stored.version))
    }

    /// Build a lazy read of every `entity` row matching `filter`.
    pub fn fetch(&self, entity: &str, filter: Filter) -> Result<Fetch, Error> {
        Fetch::new(self.clone(), entity, filter)
    }

    /// Build a lazy read of every row of `entity`.
    pub fn fetch_all(&self, entity: &str) -> Result<Fetch, Error> {
        self.fetch(entity, Filter::all(Vec::new()))
    }

    /// Resolve one relation of one row.
    pub fn fetch_related(&self, entity: &str, key: impl Into<RowKey>, relation: &str) -> Result<Vec<Row>, Error> {
        let edge = self
            .graph
            .edge(entity, relation)
            .ok_or_else(|| ShapeError::UnknownRelation {
                entity: entity.to_string(),
                relation: relation.to_string(),
            })?;
        let key = self.catalog.normalize_key(entity, key.into())?;
        let source = OptimisticController::new(self.store()).read(entity, &key)?;

        related::resolve(self.store(), &self.catalog, edge, &source)?
            .iter()
            .map(|target| Row::decode(&self.catalog, &edge.target, target))
            .collect()
    }

    /// Apply `patch` to a row still at `expected` and return the new version.
    pub fn update(
        &self,
        entity: &str,
        key: impl Into<RowKey>,
        expected: Version,
        patch: Vec<(String, Value)>,
    ) -> Result<Version, Error> {
        let key = self.catalog.normalize_key(entity, key.into())?;
        let patch = self.catalog.normalize_patch(entity, patch)?;

        let current = OptimisticController::new(self.store()).validate(entity, &key, expected)?;

        let mut fields = current.fields;
        for (name, value) in &patch {
            match fields.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.clone(),
                None => fields.push((name.clone(), value.clone())),
            }
        }
        let parents = self
            .validator()
            .validate(entity, &fields, Some(patch.as_slice()), &[])?;

        let mut batch = WriteBatch::new();
        batch.update(entity, key.clone(), expected, fields);
        link_parents(&mut batch, entity, parents);
        let version = self.store.apply(&batch)?[0];

        debug!(entity, key = %key, from = %expected, to = %version, "updated row");
        Ok(version)
    }

    /// Delete a row still at `expected`, along with every row that cascades
    /// from it. Returns the removed rows, dependents first and the root last.
    pub fn delete(&self, entity: &str, key: impl Into<RowKey>, expected: Version) -> Result<Vec<RemovedRow>, Error> {
        let key = self.catalog.normalize_key(entity, key.into())?;

        let root = OptimisticController::new(self.store()).validate(entity, &key, expected)?;
        let plan = self.planner().plan_row(entity, root)?;
        self.store.apply(&plan.to_batch())?;

        debug!(entity, key = %key, removed = plan.len(), "deleted row");
        Ok(plan.removed())
    }

    /// Compute the delete plan for a row without applying it.
    pub fn plan_delete(&self, entity: &str, key: impl Into<RowKey>) -> Result<DeletePlan, Error> {
        let key = self.catalog.normalize_key(entity, key.into())?;
        self.planner().plan(entity, &key)
    }

    fn validator(&self) -> ForeignKeyValidator<'_> {
        ForeignKeyValidator::new(self.store(), &self.catalog, &self.graph)
    }

    fn planner(&self) -> DeletePlanner<'_> {
        DeletePlanner::new(self.store(), &self.catalog, &self.graph)
    }

    /// Normalize a new row, allocating its auto-increment key if omitted.
    fn prepare_insert(
        &self,
        entity: &str,
        fields: Vec<(String, Value)>,
    ) -> Result<(RowKey, Vec<(String, Value)>), Error> {
        let mut fields = self.catalog.normalize_insert(entity, fields)?;
        let def = self.catalog.entity(entity)?;

        if let Some(auto) = def.auto_increment_field() {
            match fields.iter().find(|(n, _)| n == &auto.name) {
                Some((_, value)) => {
                    if let Some(used) = value.as_i64() {
                        self.store.advance_sequence(entity, used)?;
                    }
                }
                None => {
                    let next = self.store.next_sequence(entity)?;
                    let value = match auto.field_type {
                        FieldType::Scalar(ScalarType::Int32) => {
                            Value::Int32(i32::try_from(next).map_err(|_| {
                            ShapeError::SequenceExhausted {
                                entity: entity.to_string(),
                                field: auto.name.clone(),
                            }
                        })?)
                        }
                        _ => Value::Int64(next),
                    };
                    fields.push((auto.name.clone(), value));
                }
            }
        }

        let key = self.catalog.key_of(entity, &fields)?;
        Ok((key, fields))
    }
}

/// Queue a `link` for every parent a written row references.
fn link_parents(batch: &mut WriteBatch, child: &str, parents: Vec<ParentRef>) {
    for parent in parents {
        batch.link(parent.entity, parent.key, parent.relation, child);
    }
}

impl std::fmt::Debug for CrudExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudExecutor")
            .field("entities", &self.catalog.len())
            .field("relations", &self.graph.relations().len())
            .finish()
    }
}
