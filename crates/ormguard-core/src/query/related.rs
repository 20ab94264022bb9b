//! Join resolution along relationship edges.
//!
//! Every edge, whether it comes from a declared foreign key or a custom
//! equality join, resolves here. Joins run on storage-form values, so enum
//! fields compare by their persisted representation. A null in any source
//! join field matches nothing.

use ormguard_proto::Value;

use super::FilterEvaluator;
use crate::catalog::{Catalog, Edge};
use crate::error::Error;
use crate::storage::{RowKey, RowStore, StoredRow};

/// Rows of `edge.target` joined to `source`.
pub fn resolve(
    store: &dyn RowStore,
    catalog: &Catalog,
    edge: &Edge,
    source: &StoredRow,
) -> Result<Vec<StoredRow>, Error> {
    match join_values(edge, &source.fields) {
        Some(values) => find(store, catalog, edge, &values),
        None => Ok(Vec::new()),
    }
}

/// Values of the source join fields, or `None` if any is null or absent.
pub fn join_values(edge: &Edge, fields: &[(String, Value)]) -> Option<Vec<Value>> {
    edge.source_fields
        .iter()
        .map(|name| {
            fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .filter(|v| !v.is_null())
                .cloned()
        })
        .collect()
}

/// Rows of `edge.target` whose join fields equal `values`.
///
/// When the target join fields are exactly the target's primary key this is
/// a point read; otherwise the target entity is scanned.
pub fn find(
    store: &dyn RowStore,
    catalog: &Catalog,
    edge: &Edge,
    values: &[Value],
) -> Result<Vec<StoredRow>, Error> {
    if let Some(key) = point_key(catalog, edge, values)? {
        return Ok(store.get(&edge.target, &key)?.into_iter().collect());
    }

    let mut rows = Vec::new();
    for row in store.scan(&edge.target) {
        let row = row?;
        if joins(&row, &edge.target_fields, values) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// The target key to read, when the join covers the target's primary key.
pub fn point_key(catalog: &Catalog, edge: &Edge, values: &[Value]) -> Result<Option<RowKey>, Error> {
    let target = catalog.entity(&edge.target)?;
    if target.primary_key.len() != edge.target_fields.len() {
        return Ok(None);
    }

    let mut key = Vec::with_capacity(values.len());
    for name in &target.primary_key {
        match edge.target_fields.iter().position(|f| f == name) {
            Some(i) => key.push(values[i].clone()),
            None => return Ok(None),
        }
    }
    Ok(Some(catalog.normalize_key(&edge.target, RowKey::new(key))?))
}

fn joins(row: &StoredRow, fields: &[String], values: &[Value]) -> bool {
    fields.iter().zip(values).all(|(field, value)| {
        row.get(field)
            .map(|v| FilterEvaluator::values_equal(v, value))
            .unwrap_or(false)
    })
}
