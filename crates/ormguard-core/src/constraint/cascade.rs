//! Delete planning for CASCADE and RESTRICT relations.
//!
//! Planning runs in two phases so that no partial plan is ever returned:
//!
//! 1. A depth-first walk from the root follows every dependent edge with
//!    CASCADE policy and collects the closure of rows to remove, recording
//!    the version each was read at. Rows reachable along several paths are
//!    planned once.
//! 2. Every planned row is checked against its RESTRICT edges. A dependent
//!    row that is not itself part of the closure blocks the whole delete.
//!
//! This deliberately relaxes "any RESTRICT dependent aborts": a dependent
//! already in the cascade closure is removed with its parent and does not
//! block.
//!
//! The plan records each row's version and link stamp. [`DeletePlan::to_batch`]
//! turns them into a guard and a conditional delete per row, so a dependent
//! linked or a planned row changed after planning makes the store reject
//! the batch with a conflict. Custom-join relations are walked exactly like
//! foreign-key relations, but writes never link through them.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::catalog::{Catalog, DeleteBehavior, RelationGraph};
use crate::error::{Error, ReferentialError};
use crate::query::related;
use crate::storage::{RowKey, RowStore, StoredRow, Version, WriteBatch};

/// A row scheduled for removal.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRow {
    /// Entity name.
    pub entity: String,
    /// Row key.
    pub key: RowKey,
    /// Version the row was read at; the delete is conditional on it.
    pub version: Version,
    /// Link stamp the row was read at; new references since then abort.
    pub links: Version,
    /// Relation that pulled the row in, `None` for the root.
    pub via: Option<String>,
}

/// A row removed by a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedRow {
    /// Entity name.
    pub entity: String,
    /// Row key.
    pub key: RowKey,
}

/// The full set of rows a delete removes.
///
/// Rows are ordered so that every dependent precedes the row it depends
/// on; the root is last.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    rows: Vec<PlannedRow>,
}

impl DeletePlan {
    /// The requested row.
    pub fn root(&self) -> Option<&PlannedRow> {
        self.rows.last()
    }

    /// Every planned row, dependents first.
    pub fn rows(&self) -> &[PlannedRow] {
        &self.rows
    }

    /// Number of planned rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the plan removes a given row.
    pub fn contains(&self, entity: &str, key: &RowKey) -> bool {
        self.rows.iter().any(|r| r.entity == entity && &r.key == key)
    }

    /// Guarded conditional deletes for every planned row, as one batch.
    pub fn to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for row in &self.rows {
            batch.guard(row.entity.clone(), row.key.clone(), row.links);
            batch.delete(row.entity.clone(), row.key.clone(), row.version);
        }
        batch
    }

    /// The rows this plan removes.
    pub fn removed(&self) -> Vec<RemovedRow> {
        self.rows
            .iter()
            .map(|r| RemovedRow {
                entity: r.entity.clone(),
                key: r.key.clone(),
            })
            .collect()
    }
}

/// Builds [`DeletePlan`]s by walking the relationship graph.
pub struct DeletePlanner<'a> {
    store: &'a dyn RowStore,
    catalog: &'a Catalog,
    graph: &'a RelationGraph,
}

impl<'a> DeletePlanner<'a> {
    /// Create a new delete planner.
    pub fn new(store: &'a dyn RowStore, catalog: &'a Catalog, graph: &'a RelationGraph) -> Self {
        Self {
            store,
            catalog,
            graph,
        }
    }

    /// Plan the removal of `entity` `key` and everything that cascades from it.
    pub fn plan(&self, entity: &str, key: &RowKey) -> Result<DeletePlan, Error> {
        let root = self.store.get(entity, key)?.ok_or_else(|| Error::NotFound {
            entity: entity.to_string(),
            key: key.clone(),
        })?;
        self.plan_row(entity, root)
    }

    /// Plan the removal of an already read row.
    pub fn plan_row(&self, entity: &str, root: StoredRow) -> Result<DeletePlan, Error> {
        let mut visited = HashSet::new();
        let mut collected = Vec::new();
        self.collect(entity, root, None, &mut visited, &mut collected)?;

        for (planned, stored) in &collected {
            self.check_restrict(planned, stored, &visited)?;
        }

        Ok(DeletePlan {
            rows: collected.into_iter().map(|(planned, _)| planned).collect(),
        })
    }

    fn collect(
        &self,
        entity: &str,
        row: StoredRow,
        via: Option<&str>,
        visited: &mut HashSet<(String, Vec<u8>)>,
        out: &mut Vec<(PlannedRow, StoredRow)>,
    ) -> Result<(), Error> {
        if !visited.insert((entity.to_string(), row.key.encode()?)) {
            return Ok(());
        }

        for edge in self
            .graph
            .dependents(entity)
            .filter(|e| e.on_delete == DeleteBehavior::Cascade)
        {
            for dependent in related::resolve(self.store, self.catalog, edge, &row)? {
                debug!(
                    entity = %edge.target,
                    key = %dependent.key,
                    relation = %edge.relation,
                    "cascading delete"
                );
                self.collect(&edge.target, dependent, Some(edge.relation.as_str()), visited, out)?;
            }
        }

        out.push((
            PlannedRow {
                entity: entity.to_string(),
                key: row.key.clone(),
                version: row.version,
                links: row.links,
                via: via.map(str::to_string),
            },
            row,
        ));
        Ok(())
    }

    fn check_restrict(
        &self,
        planned: &PlannedRow,
        stored: &StoredRow,
        visited: &HashSet<(String, Vec<u8>)>,
    ) -> Result<(), Error> {
        for edge in self
            .graph
            .dependents(&planned.entity)
            .filter(|e| e.on_delete == DeleteBehavior::Restrict)
        {
            for dependent in related::resolve(self.store, self.catalog, edge, stored)? {
                if visited.contains(&(edge.target.clone(), dependent.key.encode()?)) {
                    continue;
                }
                warn!(
                    entity = %planned.entity,
                    key = %planned.key,
                    blocking_entity = %edge.target,
                    blocking_key = %dependent.key,
                    relation = %edge.relation,
                    "delete restricted"
                );
                return Err(ReferentialError::Restricted {
                    relation: edge.relation.clone(),
                    entity: planned.entity.clone(),
                    key: planned.key.clone(),
                    blocking_entity: edge.target.clone(),
                    blocking_key: dependent.key,
                }
                .into());
            }
        }
        Ok(())
    }
}
