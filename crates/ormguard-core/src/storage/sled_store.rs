//! Sled-backed row store.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use tracing::info;

use super::key::{data_key, entity_prefix, split_data_key};
use super::value_codec::{decode_fields, encode_fields};
use super::{
    meta_key, sequence_key, Record, Resolved, RowIter, RowKey, RowStore, StorageConfig, StoredRow,
    Version, WriteBatch,
};
use crate::error::Error;

/// Tree name for row data.
const DATA_TREE: &str = "data";

/// Tree name for sequences and named metadata.
const META_TREE: &str = "meta";

/// A [`RowStore`] over a sled database.
///
/// Rows live in the `data` tree under `entity name, NUL, encoded key`, each
/// value an rkyv-serialized [`Record`]. Batches run inside a transaction on
/// the data tree, so the version and link checks and the writes form one
/// atomic unit. Sequences and metadata live in the `meta` tree and are
/// written outside any batch.
pub struct SledStore {
    db: Db,
    data_tree: Tree,
    meta_tree: Tree,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: &StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "opened sled store"
        );
        Self::from_db(db)
    }

    /// Wrap an already opened sled database.
    pub fn from_db(db: Db) -> Result<Self, Error> {
        let data_tree = db.open_tree(DATA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;
        Ok(Self {
            db,
            data_tree,
            meta_tree,
        })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    fn decode_row(key: RowKey, bytes: &[u8]) -> Result<StoredRow, Error> {
        let record = Record::from_bytes(bytes)?;
        Ok(StoredRow {
            key,
            version: record.version(),
            links: record.links(),
            fields: decode_fields(&record.data)?,
        })
    }
}

fn decode_counter(bytes: Option<&[u8]>) -> i64 {
    bytes
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(i64::from_be_bytes)
        .unwrap_or(0)
}

impl RowStore for SledStore {
    fn get(&self, entity: &str, key: &RowKey) -> Result<Option<StoredRow>, Error> {
        match self.data_tree.get(data_key(entity, key)?)? {
            Some(bytes) => Ok(Some(Self::decode_row(key.clone(), &bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self, entity: &str) -> RowIter<'_> {
        let prefix = entity_prefix(entity);
        let prefix_len = prefix.len();

        Box::new(self.data_tree.scan_prefix(prefix).map(move |result| {
            let (key_bytes, value_bytes) = result?;
            let key = split_data_key(&key_bytes, prefix_len)?;
            Self::decode_row(key, &value_bytes)
        }))
    }

    fn apply(&self, batch: &WriteBatch) -> Result<Vec<Version>, Error> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        // Encode outside the transaction; the closure may be retried.
        let prepared = batch
            .ops()
            .iter()
            .map(|op| {
                let key = data_key(op.entity(), op.key())?;
                let payload = op.fields().map(encode_fields).transpose()?;
                Ok((key, payload))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let result: Result<Vec<Version>, TransactionError<Error>> =
            self.data_tree.transaction(|tx| {
                let mut versions = Vec::with_capacity(prepared.len());
                for (op, (key, payload)) in batch.ops().iter().zip(&prepared) {
                    let current = match tx.get(key.as_slice())? {
                        Some(bytes) => Some(
                            Record::from_bytes(&bytes).map_err(ConflictableTransactionError::Abort)?,
                        ),
                        None => None,
                    };
                    let state = current.as_ref().map(Record::state);

                    let written = match (
                        op.resolve(state).map_err(ConflictableTransactionError::Abort)?,
                        current,
                    ) {
                        (Resolved::Write(next), _) => {
                            let data = payload.clone().unwrap_or_default();
                            Some(Record::new(data, next.version, next.links))
                        }
                        (Resolved::Relink(links), Some(mut record)) => {
                            record.links = links.raw();
                            Some(record)
                        }
                        (Resolved::Remove, Some(record)) => {
                            tx.remove(key.as_slice())?;
                            versions.push(record.version());
                            None
                        }
                        (_, record) => {
                            versions.push(record.map(|r| r.version()).unwrap_or(Version::new(0)));
                            None
                        }
                    };

                    if let Some(record) = written {
                        let bytes = record.to_bytes().map_err(ConflictableTransactionError::Abort)?;
                        tx.insert(key.as_slice(), bytes)?;
                        versions.push(record.version());
                    }
                }
                Ok(versions)
            });

        match result {
            Ok(versions) => Ok(versions),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    fn next_sequence(&self, entity: &str) -> Result<i64, Error> {
        let updated = self
            .meta_tree
            .update_and_fetch(sequence_key(entity), |old| {
                Some((decode_counter(old) + 1).to_be_bytes().to_vec())
            })?;
        Ok(decode_counter(updated.as_deref()))
    }

    fn advance_sequence(&self, entity: &str, used: i64) -> Result<(), Error> {
        self.meta_tree
            .fetch_and_update(sequence_key(entity), |old| {
                Some(decode_counter(old).max(used).to_be_bytes().to_vec())
            })?;
        Ok(())
    }

    fn load_meta(&self, name: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.meta_tree.get(meta_key(name))?.map(|v| v.to_vec()))
    }

    fn store_meta(&self, name: &str, value: &[u8]) -> Result<(), Error> {
        self.meta_tree.insert(meta_key(name), value)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}
