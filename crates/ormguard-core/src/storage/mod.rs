//! Storage binding for ORMGuard.
//!
//! The core talks to storage through [`RowStore`]. A store must offer point
//! reads by key, conditional writes keyed on `(key, version)`, atomic
//! multi-row batches, and a fresh version on every successful write. Two
//! implementations ship with the crate: [`SledStore`] for persistent
//! databases and [`MemoryStore`] for ephemeral ones.

mod batch;
mod config;
mod memory;
mod record;
mod sled_store;

pub mod key;
pub mod value_codec;

use ormguard_proto::Value;

use crate::error::Error;

pub use batch::{Resolved, RowState, WriteBatch, WriteOp};
pub use config::StorageConfig;
pub use key::RowKey;
pub use memory::MemoryStore;
pub use record::{Record, Version};
pub use sled_store::SledStore;

/// A row as held by the store: key, version and storage-form fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Row key.
    pub key: RowKey,
    /// Current version.
    pub version: Version,
    /// Link stamp, bumped when a new row references this one.
    pub links: Version,
    /// Fields in storage form (enum fields hold their external string).
    pub fields: Vec<(String, Value)>,
}

impl StoredRow {
    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Iterator over the rows of one entity.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<StoredRow, Error>> + 'a>;

/// The contract a backing store must meet.
pub trait RowStore: Send + Sync {
    /// Point read by key.
    fn get(&self, entity: &str, key: &RowKey) -> Result<Option<StoredRow>, Error>;

    /// Lazily scan every row of an entity in storage order.
    fn scan(&self, entity: &str) -> RowIter<'_>;

    /// Apply a batch atomically.
    ///
    /// Every op is checked against the row's current version inside the
    /// same atomic unit that performs the writes. Returns one version per
    /// op: the new version for inserts and updates, the removed version for
    /// deletes, and the untouched row version for links and guards.
    fn apply(&self, batch: &WriteBatch) -> Result<Vec<Version>, Error>;

    /// Allocate the next value of an entity's sequence (first value is 1).
    fn next_sequence(&self, entity: &str) -> Result<i64, Error>;

    /// Ensure the next allocated value is greater than `used`.
    fn advance_sequence(&self, entity: &str, used: i64) -> Result<(), Error>;

    /// Read a metadata entry.
    fn load_meta(&self, name: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Write a metadata entry.
    fn store_meta(&self, name: &str, value: &[u8]) -> Result<(), Error>;

    /// Flush buffered writes to durable storage.
    fn flush(&self) -> Result<(), Error>;
}

/// Metadata key for an entity's sequence.
pub(crate) fn sequence_key(entity: &str) -> Vec<u8> {
    let mut key = b"seq:".to_vec();
    key.extend_from_slice(entity.as_bytes());
    key
}

/// Metadata key for a named entry.
pub(crate) fn meta_key(name: &str) -> Vec<u8> {
    let mut key = b"meta:".to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}
