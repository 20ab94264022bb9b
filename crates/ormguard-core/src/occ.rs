//! Optimistic concurrency control.
//!
//! Callers read a row together with its [`Version`] and hand that version
//! back on every write. The controller checks it against the stored row;
//! the store repeats the same comparison inside the atomic batch that
//! performs the write, so a check can never be separated from its write.
//! New versions are always assigned by the store, never computed here.

use tracing::warn;

use crate::error::Error;
use crate::storage::{RowKey, RowStore, StoredRow, Version};

/// Version checks against a row store.
pub struct OptimisticController<'a> {
    store: &'a dyn RowStore,
}

impl<'a> OptimisticController<'a> {
    /// Create a controller over `store`.
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self { store }
    }

    /// Read a row and the version a later write must present.
    pub fn read(&self, entity: &str, key: &RowKey) -> Result<StoredRow, Error> {
        self.store
            .get(entity, key)?
            .ok_or_else(|| Error::NotFound {
                entity: entity.to_string(),
                key: key.clone(),
            })
    }

    /// Read a row and check it is still at `expected`.
    ///
    /// Fails with `Conflict` when the row has been written or deleted since
    /// the caller read it. A deleted row reports `actual: None`.
    pub fn validate(&self, entity: &str, key: &RowKey, expected: Version) -> Result<StoredRow, Error> {
        let row = self.store.get(entity, key)?;
        let actual = row.as_ref().map(|r| r.version);
        match row {
            Some(row) if row.version == expected => Ok(row),
            _ => {
                warn!(
                    entity,
                    key = %key,
                    expected = %expected,
                    actual = ?actual,
                    "optimistic conflict"
                );
                Err(Error::Conflict {
                    entity: entity.to_string(),
                    key: key.clone(),
                    expected,
                    actual,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, WriteBatch};
    use ormguard_proto::Value;

    fn store_with_row() -> (MemoryStore, Version) {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.insert(
            "Student",
            RowKey::single(Value::Int32(1)),
            vec![("score".into(), Value::Int32(80))],
        );
        let version = store.apply(&batch).unwrap()[0];
        (store, version)
    }

    #[test]
    fn test_validate_current_version() {
        let (store, version) = store_with_row();
        let occ = OptimisticController::new(&store);
        let row = occ.validate("Student", &RowKey::single(Value::Int32(1)), version).unwrap();
        assert_eq!(row.version, version);
    }

    #[test]
    fn test_stale_version_conflicts() {
        let (store, v0) = store_with_row();
        let key = RowKey::single(Value::Int32(1));

        let mut batch = WriteBatch::new();
        batch.update("Student", key.clone(), v0, vec![("score".into(), Value::Int32(90))]);
        let v1 = store.apply(&batch).unwrap()[0];
        assert_ne!(v0, v1);

        let err = OptimisticController::new(&store)
            .validate("Student", &key, v0)
            .unwrap_err();
        match err {
            Error::Conflict { expected, actual, .. } => {
                assert_eq!(expected, v0);
                assert_eq!(actual, Some(v1));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_row() {
        let (store, version) = store_with_row();
        let occ = OptimisticController::new(&store);
        let key = RowKey::single(Value::Int32(2));
        assert!(occ.read("Student", &key).unwrap_err().is_not_found());
        assert!(occ.validate("Student", &key, version).unwrap_err().is_conflict());
    }

    #[test]
    fn test_deleted_row_conflicts() {
        let (store, v0) = store_with_row();
        let key = RowKey::single(Value::Int32(1));

        let mut batch = WriteBatch::new();
        batch.delete("Student", key.clone(), v0);
        store.apply(&batch).unwrap();

        let err = OptimisticController::new(&store)
            .validate("Student", &key, v0)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { actual: None, .. }));
    }
}
