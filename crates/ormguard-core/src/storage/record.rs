//! Stored record and version token.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use super::batch::RowState;
use crate::error::Error;

/// Opaque per-row version token.
///
/// Callers only compare versions for equality. Internally a version is the
/// write time in microseconds since the Unix epoch, bumped past the row's
/// previous version when the clock has not advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(u64);

impl Version {
    /// Wrap a raw version value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw version value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The version assigned to a row written now, given its previous version.
    pub fn next_after(previous: Option<Version>) -> Self {
        let now = super::key::current_timestamp();
        match previous {
            Some(prev) if prev.0 >= now => Self(prev.0.saturating_add(1)),
            _ => Self(now),
        }
    }

    /// The version as a timestamp value, for the entity's version field.
    pub fn as_timestamp(&self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:016x}", self.0)
    }
}

/// A stored row payload with its version and link stamp.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Encoded field data.
    pub data: Vec<u8>,

    /// Version token of this row.
    pub version: u64,

    /// Bumped when another row starts referencing this one.
    pub links: u64,
}

impl Record {
    /// Create a record at the given version and link stamp.
    pub fn new(data: Vec<u8>, version: Version, links: Version) -> Self {
        Self {
            data,
            version: version.raw(),
            links: links.raw(),
        }
    }

    /// Version token of this record.
    pub fn version(&self) -> Version {
        Version(self.version)
    }

    /// Link stamp of this record.
    pub fn links(&self) -> Version {
        Version(self.links)
    }

    /// Version and link stamp together.
    pub fn state(&self) -> RowState {
        RowState {
            version: self.version(),
            links: self.links(),
        }
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
