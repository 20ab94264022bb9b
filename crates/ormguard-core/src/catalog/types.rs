//! Core type definitions for the catalog.

use ormguard_proto::Value;
use rkyv::{Archive, Deserialize, Serialize};

use super::enums::EnumDef;

/// Scalar data types supported by ORMGuard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

impl ScalarType {
    /// Lower-case type name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Uuid => "uuid",
        }
    }

    /// Check if this type is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::Int32 | ScalarType::Int64)
    }

    /// Whether values of the two types can be joined on.
    pub fn joinable_with(&self, other: &ScalarType) -> bool {
        self == other || (self.is_integer() && other.is_integer())
    }

    /// Coerce a non-null value to this type.
    ///
    /// Integers widen, and narrow when they fit; integers are accepted for
    /// floats and timestamps. Anything else must match exactly. On failure
    /// the original value is handed back.
    pub fn coerce(&self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (ScalarType::Bool, v @ Value::Bool(_)) => Ok(v),
            (ScalarType::Int32, v @ Value::Int32(_)) => Ok(v),
            (ScalarType::Int32, Value::Int64(n)) => {
                i32::try_from(n).map(Value::Int32).map_err(|_| Value::Int64(n))
            }
            (ScalarType::Int64, v @ Value::Int64(_)) => Ok(v),
            (ScalarType::Int64, Value::Int32(n)) => Ok(Value::Int64(n as i64)),
            (ScalarType::Float64, v @ Value::Float64(_)) => Ok(v),
            (ScalarType::Float64, Value::Int32(n)) => Ok(Value::Float64(n as f64)),
            (ScalarType::Float64, Value::Int64(n)) => Ok(Value::Float64(n as f64)),
            (ScalarType::String, v @ Value::String(_)) => Ok(v),
            (ScalarType::Bytes, v @ Value::Bytes(_)) => Ok(v),
            (ScalarType::Timestamp, v @ Value::Timestamp(_)) => Ok(v),
            (ScalarType::Timestamp, Value::Int64(n)) => Ok(Value::Timestamp(n)),
            (ScalarType::Uuid, v @ Value::Uuid(_)) => Ok(v),
            (_, v) => Err(v),
        }
    }
}

/// Field types.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An enumerated value, persisted as its external string.
    Enum(EnumDef),
    /// An optional enumerated value.
    OptionalEnum(EnumDef),
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an enum field type.
    pub fn enumeration(def: EnumDef) -> Self {
        FieldType::Enum(def)
    }

    /// Create an optional enum field type.
    pub fn optional_enum(def: EnumDef) -> Self {
        FieldType::OptionalEnum(def)
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::OptionalScalar(_) | FieldType::OptionalEnum(_))
    }

    /// The scalar type values are stored as.
    pub fn storage_type(&self) -> ScalarType {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => *s,
            FieldType::Enum(_) | FieldType::OptionalEnum(_) => ScalarType::String,
        }
    }

    /// The enum mapping, for enumerated fields.
    pub fn enum_def(&self) -> Option<&EnumDef> {
        match self {
            FieldType::Enum(def) | FieldType::OptionalEnum(def) => Some(def),
            _ => None,
        }
    }

    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Scalar(s) => s.name().to_string(),
            FieldType::OptionalScalar(s) => format!("optional {}", s.name()),
            FieldType::Enum(def) => format!("enum {}", def.name),
            FieldType::OptionalEnum(def) => format!("optional enum {}", def.name),
        }
    }
}
