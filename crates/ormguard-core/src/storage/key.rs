//! Row key encoding.

use std::fmt;

use ormguard_proto::Value;

use super::value_codec::{decode_value, encode_value};
use crate::error::Error;

/// Separator between the entity name and the encoded key.
const ENTITY_SEPARATOR: u8 = 0;

/// The identity of a row: the ordered tuple of its primary-key values.
///
/// Composite-key entities have no identity outside this tuple.
#[derive(Clone, PartialEq)]
pub struct RowKey(Vec<Value>);

impl RowKey {
    /// Create a key from its components in primary-key order.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Create a single-component key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Key components in primary-key order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the key, returning its components.
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// Encode the key components with the value codec.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(self.0.len() * 9);
        for value in &self.0 {
            encode_value(&mut buf, value)?;
        }
        Ok(buf)
    }

    /// Decode key components produced by [`RowKey::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut values = Vec::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let (value, read) = decode_value(&bytes[cursor..])?;
            values.push(value);
            cursor += read;
        }
        Ok(Self(values))
    }
}

impl From<Value> for RowKey {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<Value>> for RowKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowKey{}", self)
    }
}

/// Storage key for a row: `entity name, NUL, encoded key`.
pub fn data_key(entity: &str, key: &RowKey) -> Result<Vec<u8>, Error> {
    let mut buf = entity_prefix(entity);
    buf.extend_from_slice(&key.encode()?);
    Ok(buf)
}

/// Prefix shared by every row of an entity.
pub fn entity_prefix(entity: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(entity.len() + 1);
    buf.extend_from_slice(entity.as_bytes());
    buf.push(ENTITY_SEPARATOR);
    buf
}

/// Recover the row key from a storage key with a known prefix length.
pub fn split_data_key(bytes: &[u8], prefix_len: usize) -> Result<RowKey, Error> {
    if bytes.len() < prefix_len || bytes.get(prefix_len.wrapping_sub(1)) != Some(&ENTITY_SEPARATOR)
    {
        return Err(Error::InvalidKey);
    }
    RowKey::decode(&bytes[prefix_len..])
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}
