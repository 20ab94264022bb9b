//! In-memory row store.

use std::collections::{BTreeMap, HashMap};

use parking_lot::{Mutex, RwLock};

use super::key::{data_key, entity_prefix, split_data_key};
use super::{Resolved, RowIter, RowKey, RowState, RowStore, StoredRow, Version, WriteBatch};
use crate::error::Error;
use ormguard_proto::Value;

#[derive(Debug, Clone)]
struct Entry {
    version: Version,
    links: Version,
    fields: Vec<(String, Value)>,
}

/// A [`RowStore`] kept entirely in memory.
///
/// Shares the key layout of [`super::SledStore`]; a batch is validated
/// against a staged overlay under the write lock and only then published.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<Vec<u8>, Entry>>,
    sequences: Mutex<HashMap<String, i64>>,
    meta: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all entities.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl RowStore for MemoryStore {
    fn get(&self, entity: &str, key: &RowKey) -> Result<Option<StoredRow>, Error> {
        let bytes = data_key(entity, key)?;
        Ok(self.rows.read().get(&bytes).map(|entry| StoredRow {
            key: key.clone(),
            version: entry.version,
            links: entry.links,
            fields: entry.fields.clone(),
        }))
    }

    fn scan(&self, entity: &str) -> RowIter<'_> {
        let prefix = entity_prefix(entity);
        let prefix_len = prefix.len();

        // Snapshot the entity's range so the lock is not held by the caller.
        let snapshot: Vec<(Vec<u8>, Entry)> = self
            .rows
            .read()
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();

        Box::new(snapshot.into_iter().map(move |(k, entry)| {
            Ok(StoredRow {
                key: split_data_key(&k, prefix_len)?,
                version: entry.version,
                links: entry.links,
                fields: entry.fields,
            })
        }))
    }

    fn apply(&self, batch: &WriteBatch) -> Result<Vec<Version>, Error> {
        let mut rows = self.rows.write();
        let mut staged: BTreeMap<Vec<u8>, Option<Entry>> = BTreeMap::new();
        let mut versions = Vec::with_capacity(batch.len());

        for op in batch.ops() {
            let key = data_key(op.entity(), op.key())?;
            let current = match staged.get(&key) {
                Some(staged) => staged.clone(),
                None => rows.get(&key).cloned(),
            };
            let state = current.as_ref().map(|e| RowState {
                version: e.version,
                links: e.links,
            });

            match (op.resolve(state)?, current) {
                (Resolved::Write(next), _) => {
                    let fields = op.fields().map(<[_]>::to_vec).unwrap_or_default();
                    staged.insert(
                        key,
                        Some(Entry {
                            version: next.version,
                            links: next.links,
                            fields,
                        }),
                    );
                    versions.push(next.version);
                }
                (Resolved::Relink(links), Some(mut entry)) => {
                    entry.links = links;
                    versions.push(entry.version);
                    staged.insert(key, Some(entry));
                }
                (Resolved::Remove, Some(entry)) => {
                    staged.insert(key, None);
                    versions.push(entry.version);
                }
                (_, current) => {
                    versions.push(current.map(|e| e.version).unwrap_or(Version::new(0)));
                }
            }
        }

        for (key, entry) in staged {
            match entry {
                Some(entry) => {
                    rows.insert(key, entry);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }

        Ok(versions)
    }

    fn next_sequence(&self, entity: &str) -> Result<i64, Error> {
        let mut sequences = self.sequences.lock();
        let counter = sequences.entry(entity.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn advance_sequence(&self, entity: &str, used: i64) -> Result<(), Error> {
        let mut sequences = self.sequences.lock();
        let counter = sequences.entry(entity.to_string()).or_insert(0);
        *counter = (*counter).max(used);
        Ok(())
    }

    fn load_meta(&self, name: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.meta.read().get(name).cloned())
    }

    fn store_meta(&self, name: &str, value: &[u8]) -> Result<(), Error> {
        self.meta.write().insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::conformance;

    #[test]
    fn test_conformance() {
        conformance::run_all(|| Box::new(MemoryStore::new()));
    }

    #[test]
    fn test_failed_batch_publishes_nothing() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.insert("Teacher", RowKey::single(1), vec![]);
        batch.insert("Teacher", RowKey::single(2), vec![]);
        batch.insert("Teacher", RowKey::single(1), vec![]);
        assert!(store.apply(&batch).unwrap_err().is_uniqueness());
        assert!(store.is_empty());
    }

    #[test]
    fn test_scan_snapshot_is_stable() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.insert("Clazz", RowKey::single(1), vec![]);
        store.apply(&batch).unwrap();

        let mut scan = store.scan("Clazz");
        let mut more = WriteBatch::new();
        more.insert("Clazz", RowKey::single(2), vec![]);
        store.apply(&more).unwrap();

        assert!(scan.next().is_some());
        assert!(scan.next().is_none());
        assert_eq!(store.len(), 2);
    }
}
