//! Lazy, restartable bulk reads.

use ormguard_proto::Filter;

use super::{normalize_filter, related, FilterEvaluator, Row};
use crate::error::{Error, ShapeError};
use crate::executor::CrudExecutor;
use crate::storage::{RowIter, StoredRow};

/// A validated bulk read over one entity.
///
/// Building a `Fetch` checks the entity, the filter and any included
/// relations, but reads nothing. Rows are produced on demand by
/// [`Fetch::iter`], which can be called any number of times; every call
/// starts a fresh pass over the store.
#[derive(Clone)]
pub struct Fetch {
    executor: CrudExecutor,
    entity: String,
    filter: Filter,
    limit: Option<usize>,
    includes: Vec<String>,
}

impl Fetch {
    pub(crate) fn new(executor: CrudExecutor, entity: &str, filter: Filter) -> Result<Self, Error> {
        let filter = normalize_filter(executor.catalog(), entity, filter)?;
        Ok(Self {
            executor,
            entity: entity.to_string(),
            filter,
            limit: None,
            includes: Vec::new(),
        })
    }

    /// Entity being read.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Stop after `n` matching rows.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Load a relation for every returned row.
    pub fn include(mut self, relation: &str) -> Result<Self, Error> {
        if self.executor.graph().edge(&self.entity, relation).is_none() {
            return Err(ShapeError::UnknownRelation {
                entity: self.entity.clone(),
                relation: relation.to_string(),
            }
            .into());
        }
        if !self.includes.iter().any(|r| r == relation) {
            self.includes.push(relation.to_string());
        }
        Ok(self)
    }

    /// Start a pass over the matching rows.
    pub fn iter(&self) -> FetchIter<'_> {
        FetchIter {
            fetch: self,
            rows: self.executor.store().scan(&self.entity),
            yielded: 0,
        }
    }

    /// Run a pass and collect every matching row.
    pub fn rows(&self) -> Result<Vec<Row>, Error> {
        self.iter().collect()
    }

    fn load(&self, stored: &StoredRow) -> Result<Option<Row>, Error> {
        let catalog = self.executor.catalog();
        let mut row = Row::decode(catalog, &self.entity, stored)?;
        if !FilterEvaluator::evaluate(&self.filter, &row.fields) {
            return Ok(None);
        }

        for name in &self.includes {
            let Some(edge) = self.executor.graph().edge(&self.entity, name) else {
                continue;
            };
            let mut related_rows = Vec::new();
            for target in related::resolve(self.executor.store(), catalog, edge, stored)? {
                related_rows.push(Row::decode(catalog, &edge.target, &target)?);
            }
            row.related.push((name.clone(), related_rows));
        }
        Ok(Some(row))
    }
}

impl std::fmt::Debug for Fetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetch")
            .field("entity", &self.entity)
            .field("filter", &self.filter)
            .field("limit", &self.limit)
            .field("includes", &self.includes)
            .finish()
    }
}

/// One pass over a [`Fetch`].
pub struct FetchIter<'a> {
    fetch: &'a Fetch,
    rows: RowIter<'a>,
    yielded: usize,
}

impl Iterator for FetchIter<'_> {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fetch.limit.is_some_and(|limit| self.yielded >= limit) {
            return None;
        }
        loop {
            let stored = match self.rows.next()? {
                Ok(stored) => stored,
                Err(e) => return Some(Err(e)),
            };
            match self.fetch.load(&stored) {
                Ok(Some(row)) => {
                    self.yielded += 1;
                    return Some(Ok(row));
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a> IntoIterator for &'a Fetch {
    type Item = Result<Row, Error>;
    type IntoIter = FetchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
