//! Validated entity catalog.
//!
//! [`Catalog`] is built once from the registered [`SchemaBundle`] entities
//! and is read-only afterwards. It is the single place where caller values
//! are converted to storage form (and back), so enum encoding, defaults,
//! nullability and key shape are enforced uniformly for every operation.

use std::collections::{HashMap, HashSet};

use ormguard_proto::Value;

use super::{EntityDef, FieldDef, FieldType, ScalarType};
use crate::error::{ConfigError, ShapeError};
use crate::storage::{RowKey, StoredRow};

/// Read-only registry of validated entity definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, EntityDef>,
    order: Vec<String>,
}

impl Catalog {
    /// Validate entity definitions and build the catalog.
    pub fn build(entities: &[EntityDef]) -> Result<Self, ConfigError> {
        let mut catalog = Catalog::default();
        for entity in entities {
            validate_entity(entity)?;
            if catalog.entities.contains_key(&entity.name) {
                return Err(ConfigError::DuplicateEntity(entity.name.clone()));
            }
            catalog.order.push(entity.name.clone());
            catalog.entities.insert(entity.name.clone(), entity.clone());
        }
        Ok(catalog)
    }

    /// Look up an entity.
    pub fn entity(&self, name: &str) -> Result<&EntityDef, ShapeError> {
        self.entities
            .get(name)
            .ok_or_else(|| ShapeError::UnknownEntity(name.to_string()))
    }

    /// Check whether an entity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Convert the fields of a new row to storage form.
    ///
    /// Omitted fields take their default, or null when nullable. An omitted
    /// auto-increment field is left out of the result so the caller can
    /// allocate it.
    pub fn normalize_insert(
        &self,
        entity: &str,
        fields: Vec<(String, Value)>,
    ) -> Result<Vec<(String, Value)>, ShapeError> {
        let def = self.entity(entity)?;
        let mut given = collect_unique(def, fields)?;

        let mut out = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            match given.remove(&field.name) {
                Some(value) if !(value.is_null() && field.auto_increment) => {
                    out.push((field.name.clone(), encode(def, field, value)?));
                }
                _ if field.auto_increment => {}
                _ => {
                    if let Some(default) = &field.default {
                        out.push((field.name.clone(), encode(def, field, default.to_value())?));
                    } else if field.is_nullable() {
                        out.push((field.name.clone(), Value::Null));
                    } else {
                        return Err(ShapeError::MissingField {
                            entity: def.name.clone(),
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Convert an update patch to storage form.
    ///
    /// Key fields and the version field cannot be patched.
    pub fn normalize_patch(
        &self,
        entity: &str,
        patch: Vec<(String, Value)>,
    ) -> Result<Vec<(String, Value)>, ShapeError> {
        let def = self.entity(entity)?;
        let given = collect_unique(def, patch)?;

        let mut out = Vec::with_capacity(given.len());
        for field in &def.fields {
            if let Some(value) = given.get(&field.name) {
                if def.is_key_field(&field.name) {
                    return Err(ShapeError::KeyFieldUpdate {
                        entity: def.name.clone(),
                        field: field.name.clone(),
                    });
                }
                out.push((field.name.clone(), encode(def, field, value.clone())?));
            }
        }
        Ok(out)
    }

    /// Extract the key of a storage-form row.
    pub fn key_of(&self, entity: &str, fields: &[(String, Value)]) -> Result<RowKey, ShapeError> {
        let def = self.entity(entity)?;
        let mut values = Vec::with_capacity(def.primary_key.len());
        for name in &def.primary_key {
            let value = fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| ShapeError::MissingField {
                    entity: def.name.clone(),
                    field: name.clone(),
                })?;
            values.push(value);
        }
        Ok(RowKey::new(values))
    }

    /// Check a caller-supplied key and coerce it to the key field types.
    pub fn normalize_key(&self, entity: &str, key: RowKey) -> Result<RowKey, ShapeError> {
        let def = self.entity(entity)?;
        if key.len() != def.primary_key.len() {
            return Err(ShapeError::KeyArity {
                entity: def.name.clone(),
                expected: def.primary_key.len(),
                found: key.len(),
            });
        }

        let mut values = Vec::with_capacity(key.len());
        for (name, value) in def.primary_key.iter().zip(key.into_values()) {
            let field = field_of(def, name)?;
            values.push(encode(def, field, value)?);
        }
        Ok(RowKey::new(values))
    }

    /// Convert a stored row to caller form, in declaration order.
    ///
    /// Enum fields decode to their internal member, and the version field
    /// (if declared) is filled from the row version.
    pub fn decode_row(&self, entity: &str, row: &StoredRow) -> Result<Vec<(String, Value)>, ShapeError> {
        let def = self.entity(entity)?;
        let mut out = Vec::with_capacity(def.fields.len() + 1);
        for field in &def.fields {
            let stored = row.get(&field.name).cloned().unwrap_or(Value::Null);
            out.push((field.name.clone(), decode(def, field, stored)?));
        }
        if let Some(version_field) = &def.version_field {
            out.push((
                version_field.clone(),
                Value::Timestamp(row.version.as_timestamp()),
            ));
        }
        Ok(out)
    }

    /// Convert a filter literal to the form decoded rows carry.
    ///
    /// Enum fields accept either the external representation or the
    /// internal member and yield the member.
    pub fn normalize_literal(&self, entity: &str, field: &str, value: Value) -> Result<Value, ShapeError> {
        let def = self.entity(entity)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        if def.is_version_field(field) {
            return ScalarType::Timestamp
                .coerce(value)
                .map_err(|v| mismatch(def, field, "timestamp".to_string(), &v));
        }

        let field_def = field_of(def, field)?;
        match &field_def.field_type {
            FieldType::Enum(enum_def) | FieldType::OptionalEnum(enum_def) => {
                let member = match &value {
                    Value::Enum(m) | Value::String(m) if enum_def.external_of(m).is_some() => {
                        m.clone()
                    }
                    Value::Enum(m) => {
                        return Err(ShapeError::UnknownEnumMember {
                            entity: def.name.clone(),
                            field: field.to_string(),
                            member: m.clone(),
                        })
                    }
                    Value::String(s) => match enum_def.internal_of(s) {
                        Some(m) => m.to_string(),
                        None => {
                            return Err(ShapeError::UnknownEnumRepresentation {
                                entity: def.name.clone(),
                                field: field.to_string(),
                                value: s.clone(),
                            })
                        }
                    },
                    other => {
                        return Err(mismatch(def, field, field_def.field_type.describe(), other))
                    }
                };
                Ok(Value::Enum(member))
            }
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s
                .coerce(value)
                .map_err(|v| mismatch(def, field, s.name().to_string(), &v)),
        }
    }

    /// Check that `field` can be referenced by a filter or join.
    pub fn check_field(&self, entity: &str, field: &str) -> Result<(), ShapeError> {
        let def = self.entity(entity)?;
        if def.is_version_field(field) {
            return Ok(());
        }
        field_of(def, field).map(|_| ())
    }
}

fn field_of<'a>(def: &'a EntityDef, name: &str) -> Result<&'a FieldDef, ShapeError> {
    def.get_field(name).ok_or_else(|| ShapeError::UnknownField {
        entity: def.name.clone(),
        field: name.to_string(),
    })
}

fn mismatch(def: &EntityDef, field: &str, expected: String, found: &Value) -> ShapeError {
    ShapeError::TypeMismatch {
        entity: def.name.clone(),
        field: field.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// Index caller fields by name, rejecting unknown, repeated and version fields.
fn collect_unique(
    def: &EntityDef,
    fields: Vec<(String, Value)>,
) -> Result<HashMap<String, Value>, ShapeError> {
    let mut given = HashMap::with_capacity(fields.len());
    for (name, value) in fields {
        if def.is_version_field(&name) {
            return Err(ShapeError::VersionFieldWrite {
                entity: def.name.clone(),
                field: name,
            });
        }
        if def.get_field(&name).is_none() {
            return Err(ShapeError::UnknownField {
                entity: def.name.clone(),
                field: name,
            });
        }
        if given.contains_key(&name) {
            return Err(ShapeError::DuplicateField {
                entity: def.name.clone(),
                field: name,
            });
        }
        given.insert(name, value);
    }
    Ok(given)
}

/// Convert one caller value to storage form.
fn encode(def: &EntityDef, field: &FieldDef, value: Value) -> Result<Value, ShapeError> {
    if value.is_null() {
        return if field.is_nullable() {
            Ok(Value::Null)
        } else {
            Err(ShapeError::NullNotAllowed {
                entity: def.name.clone(),
                field: field.name.clone(),
            })
        };
    }

    match &field.field_type {
        FieldType::Enum(enum_def) | FieldType::OptionalEnum(enum_def) => match value {
            Value::Enum(member) => match enum_def.external_of(&member) {
                Some(external) => Ok(Value::String(external.to_string())),
                None => Err(ShapeError::UnknownEnumMember {
                    entity: def.name.clone(),
                    field: field.name.clone(),
                    member,
                }),
            },
            Value::String(external) => {
                if enum_def.internal_of(&external).is_some() {
                    Ok(Value::String(external))
                } else {
                    Err(ShapeError::UnknownEnumRepresentation {
                        entity: def.name.clone(),
                        field: field.name.clone(),
                        value: external,
                    })
                }
            }
            other => Err(mismatch(def, &field.name, field.field_type.describe(), &other)),
        },
        FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s
            .coerce(value)
            .map_err(|v| mismatch(def, &field.name, field.field_type.describe(), &v)),
    }
}

/// Convert one stored value to caller form.
fn decode(def: &EntityDef, field: &FieldDef, stored: Value) -> Result<Value, ShapeError> {
    let corrupt = |detail: String| ShapeError::Corrupt {
        entity: def.name.clone(),
        detail,
    };

    if stored.is_null() {
        return if field.is_nullable() {
            Ok(Value::Null)
        } else {
            Err(corrupt(format!("{} is null", field.name)))
        };
    }

    match &field.field_type {
        FieldType::Enum(enum_def) | FieldType::OptionalEnum(enum_def) => match stored {
            Value::String(external) => match enum_def.internal_of(&external) {
                Some(member) => Ok(Value::Enum(member.to_string())),
                None => Err(ShapeError::UnknownEnumRepresentation {
                    entity: def.name.clone(),
                    field: field.name.clone(),
                    value: external,
                }),
            },
            other => Err(corrupt(format!(
                "{} holds {}, expected an enum string",
                field.name,
                other.type_name()
            ))),
        },
        FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s.coerce(stored).map_err(|v| {
            corrupt(format!("{} holds {}, expected {}", field.name, v.type_name(), s.name()))
        }),
    }
}

fn validate_entity(entity: &EntityDef) -> Result<(), ConfigError> {
    let name = &entity.name;
    if name.is_empty() || name.contains('\0') {
        return Err(ConfigError::InvalidEntityName(name.clone()));
    }

    let mut seen = HashSet::new();
    for field in &entity.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::DuplicateField {
                entity: name.clone(),
                field: field.name.clone(),
            });
        }
        if let Some(enum_def) = field.field_type.enum_def() {
            if enum_def.members.is_empty() {
                return Err(ConfigError::EmptyEnum {
                    entity: name.clone(),
                    field: field.name.clone(),
                });
            }
            if let Some(value) = enum_def.first_duplicate() {
                return Err(ConfigError::DuplicateEnumValue {
                    entity: name.clone(),
                    field: field.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        if let Some(default) = &field.default {
            if encode(entity, field, default.to_value()).is_err() {
                return Err(ConfigError::InvalidDefault {
                    entity: name.clone(),
                    field: field.name.clone(),
                });
            }
        }
    }

    validate_primary_key(entity)?;

    let auto: Vec<&FieldDef> = entity.fields.iter().filter(|f| f.auto_increment).collect();
    if let Some(field) = auto.first() {
        let reason = if auto.len() > 1 {
            Some("only one auto_increment field is allowed")
        } else if entity.primary_key.len() != 1 || entity.primary_key[0] != field.name {
            Some("auto_increment must be the sole primary key field")
        } else if !matches!(field.field_type, FieldType::Scalar(s) if s.is_integer()) {
            Some("auto_increment requires an integer field")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigError::AutoIncrement {
                entity: name.clone(),
                field: field.name.clone(),
                reason: reason.to_string(),
            });
        }
    }

    if let Some(version_field) = &entity.version_field {
        let reason = if version_field.is_empty() {
            Some("name is empty")
        } else if entity.get_field(version_field).is_some() {
            Some("collides with a declared field")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigError::InvalidVersionField {
                entity: name.clone(),
                field: version_field.clone(),
                reason: reason.to_string(),
            });
        }
    }

    Ok(())
}

fn validate_primary_key(entity: &EntityDef) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidPrimaryKey {
        entity: entity.name.clone(),
        reason,
    };

    if entity.primary_key.is_empty() {
        return Err(invalid("no key fields".to_string()));
    }
    let mut seen = HashSet::new();
    for key in &entity.primary_key {
        if !seen.insert(key.as_str()) {
            return Err(invalid(format!("'{key}' listed twice")));
        }
        let field = entity
            .get_field(key)
            .ok_or_else(|| invalid(format!("'{key}' is not a field")))?;
        if field.is_nullable() {
            return Err(invalid(format!("'{key}' is nullable")));
        }
        if field.field_type.storage_type() == ScalarType::Float64 {
            return Err(invalid(format!("'{key}' is a float")));
        }
    }
    Ok(())
}
