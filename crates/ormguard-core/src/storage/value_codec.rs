//! Value codec for encoding/decoding row payloads and key components.
//!
//! Row format:
//! - Field count (4 bytes, little-endian)
//! - For each field:
//!   - Field name length (2 bytes, little-endian)
//!   - Field name (UTF-8 bytes)
//!   - Value tag (1 byte)
//!   - Value data (variable length, depends on type)

use ormguard_proto::Value;

use crate::error::Error;

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 4,
    String = 5,
    Bytes = 6,
    Timestamp = 7,
    Uuid = 8,
    Enum = 9,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            2 => Ok(ValueTag::Int32),
            3 => Ok(ValueTag::Int64),
            4 => Ok(ValueTag::Float64),
            5 => Ok(ValueTag::String),
            6 => Ok(ValueTag::Bytes),
            7 => Ok(ValueTag::Timestamp),
            8 => Ok(ValueTag::Uuid),
            9 => Ok(ValueTag::Enum),
            _ => Err(Error::Deserialization(format!("unknown value tag: {}", value))),
        }
    }
}

/// Encode field name/value pairs to bytes.
pub fn encode_fields(fields: &[(String, Value)]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();

    let count = u32::try_from(fields.len())
        .map_err(|_| Error::Serialization("too many fields".into()))?;
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, value) in fields {
        let name_bytes = name.as_bytes();
        let name_len = u16::try_from(name_bytes.len())
            .map_err(|_| Error::Serialization("field name too long".into()))?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name_bytes);

        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes back to field name/value pairs.
pub fn decode_fields(data: &[u8]) -> Result<Vec<(String, Value)>, Error> {
    let count = u32::from_le_bytes(read_array(data, 0, "field count")?) as usize;
    let mut cursor = 4;

    let mut fields = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        let name_len = u16::from_le_bytes(read_array(data, cursor, "field name length")?) as usize;
        cursor += 2;

        let name_bytes = read_slice(data, cursor, name_len, "field name")?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| Error::Deserialization("invalid UTF-8 in field name".into()))?
            .to_string();
        cursor += name_len;

        let (value, read) = decode_value(&data[cursor..])?;
        cursor += read;

        fields.push((name, value));
    }

    Ok(fields)
}

/// Encode a single value to the buffer.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => buf.push(ValueTag::Null as u8),
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int32(n) => {
            buf.push(ValueTag::Int32 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Int64(n) => {
            buf.push(ValueTag::Int64 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float64(n) => {
            buf.push(ValueTag::Float64 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::String(s) => encode_len_prefixed(buf, ValueTag::String, s.as_bytes())?,
        Value::Bytes(b) => encode_len_prefixed(buf, ValueTag::Bytes, b)?,
        Value::Timestamp(t) => {
            buf.push(ValueTag::Timestamp as u8);
            buf.extend_from_slice(&t.to_le_bytes());
        }
        Value::Uuid(u) => {
            buf.push(ValueTag::Uuid as u8);
            buf.extend_from_slice(u);
        }
        Value::Enum(m) => encode_len_prefixed(buf, ValueTag::Enum, m.as_bytes())?,
    }
    Ok(())
}

fn encode_len_prefixed(buf: &mut Vec<u8>, tag: ValueTag, bytes: &[u8]) -> Result<(), Error> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::Serialization("value too long".into()))?;
    buf.push(tag as u8);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Decode a single value, returning it and the number of bytes consumed.
pub fn decode_value(data: &[u8]) -> Result<(Value, usize), Error> {
    let tag = ValueTag::try_from(*data.first().ok_or_else(|| {
        Error::Deserialization("empty data for value".into())
    })?)?;

    match tag {
        ValueTag::Null => Ok((Value::Null, 1)),
        ValueTag::Bool => {
            let [b] = read_array::<1>(data, 1, "bool")?;
            Ok((Value::Bool(b != 0), 2))
        }
        ValueTag::Int32 => {
            let n = i32::from_le_bytes(read_array(data, 1, "int32")?);
            Ok((Value::Int32(n), 5))
        }
        ValueTag::Int64 => {
            let n = i64::from_le_bytes(read_array(data, 1, "int64")?);
            Ok((Value::Int64(n), 9))
        }
        ValueTag::Float64 => {
            let n = f64::from_le_bytes(read_array(data, 1, "float64")?);
            Ok((Value::Float64(n), 9))
        }
        ValueTag::Timestamp => {
            let t = i64::from_le_bytes(read_array(data, 1, "timestamp")?);
            Ok((Value::Timestamp(t), 9))
        }
        ValueTag::Uuid => {
            let u: [u8; 16] = read_array(data, 1, "uuid")?;
            Ok((Value::Uuid(u), 17))
        }
        ValueTag::String | ValueTag::Enum => {
            let len = u32::from_le_bytes(read_array(data, 1, "string length")?) as usize;
            let bytes = read_slice(data, 5, len, "string")?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| Error::Deserialization("invalid UTF-8 in string".into()))?
                .to_string();
            let value = if tag == ValueTag::Enum {
                Value::Enum(s)
            } else {
                Value::String(s)
            };
            Ok((value, 5 + len))
        }
        ValueTag::Bytes => {
            let len = u32::from_le_bytes(read_array(data, 1, "bytes length")?) as usize;
            let bytes = read_slice(data, 5, len, "bytes")?;
            Ok((Value::Bytes(bytes.to_vec()), 5 + len))
        }
    }
}

fn read_slice<'a>(data: &'a [u8], at: usize, len: usize, what: &str) -> Result<&'a [u8], Error> {
    at.checked_add(len)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| Error::Deserialization(format!("data too short for {}", what)))
}

fn read_array<const N: usize>(data: &[u8], at: usize, what: &str) -> Result<[u8; N], Error> {
    let slice = read_slice(data, at, N, what)?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}
