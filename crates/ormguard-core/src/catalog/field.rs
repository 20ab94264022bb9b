//! Field definitions for entities.

use ormguard_proto::Value;
use rkyv::{Archive, Deserialize, Serialize};

use super::enums::EnumDef;
use super::types::{FieldType, ScalarType};

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Default value if not provided on create.
    pub default: Option<DefaultValue>,
    /// Allocate the value from a per-entity sequence when omitted.
    pub auto_increment: bool,
}

/// Default value for a field.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value (the external representation for enum fields).
    String(String),
}

impl DefaultValue {
    /// The default as a runtime value, before coercion to the field type.
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Null => Value::Null,
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(n) => Value::Int64(*n),
            DefaultValue::Float(f) => Value::Float64(*f),
            DefaultValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl FieldDef {
    /// Create a new field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
            auto_increment: false,
        }
    }

    /// Create a required scalar field.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar))
    }

    /// Create an optional scalar field.
    pub fn optional_scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::OptionalScalar(scalar))
    }

    /// Create a required enum field.
    pub fn enumeration(name: impl Into<String>, def: EnumDef) -> Self {
        Self::new(name, FieldType::Enum(def))
    }

    /// Create an optional enum field.
    pub fn optional_enum(name: impl Into<String>, def: EnumDef) -> Self {
        Self::new(name, FieldType::OptionalEnum(def))
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark the field as auto-incremented.
    pub fn with_auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Check if the field accepts null.
    pub fn is_nullable(&self) -> bool {
        self.field_type.is_nullable()
    }

    /// Check if a value must be supplied on create.
    pub fn is_required(&self) -> bool {
        !self.is_nullable() && self.default.is_none() && !self.auto_increment
    }
}
