//! Filter evaluation for bulk reads.
//!
//! Filters are checked against the catalog once, when a fetch is built, and
//! then evaluated against decoded rows. Literals are normalized up front so
//! that enum fields compare by internal member regardless of how the caller
//! spelled the value.

use std::cmp::Ordering;

use ormguard_proto::{CompareOp, Filter, FilterExpr, Predicate, Value};

use crate::catalog::Catalog;
use crate::error::ShapeError;

/// Validate a filter against an entity and normalize its literals.
pub fn normalize_filter(catalog: &Catalog, entity: &str, mut filter: Filter) -> Result<Filter, ShapeError> {
    catalog.entity(entity)?;
    for predicate in filter.predicates_mut() {
        let field = predicate.field().to_string();
        catalog.check_field(entity, &field)?;
        for literal in predicate.literals_mut() {
            let value = std::mem::replace(literal, Value::Null);
            *literal = catalog.normalize_literal(entity, &field, value)?;
        }
    }
    Ok(filter)
}

/// Evaluates filters against rows of decoded field values.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate a filter against a row.
    pub fn evaluate(filter: &Filter, row: &[(String, Value)]) -> bool {
        match &filter.expression {
            FilterExpr::Match(p) => Self::evaluate_predicate(p, row),
            FilterExpr::All(ps) => ps.iter().all(|p| Self::evaluate_predicate(p, row)),
            FilterExpr::Any(ps) => ps.iter().any(|p| Self::evaluate_predicate(p, row)),
        }
    }

    /// Evaluate a single predicate.
    pub fn evaluate_predicate(predicate: &Predicate, row: &[(String, Value)]) -> bool {
        match predicate {
            Predicate::Compare { field, op, value } => {
                let Some(fv) = Self::get_field_value(row, field) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => Self::values_equal(fv, value),
                    CompareOp::Ne => !Self::values_equal(fv, value),
                    CompareOp::Lt => Self::ordered(fv, value, Ordering::is_lt),
                    CompareOp::Le => Self::ordered(fv, value, Ordering::is_le),
                    CompareOp::Gt => Self::ordered(fv, value, Ordering::is_gt),
                    CompareOp::Ge => Self::ordered(fv, value, Ordering::is_ge),
                }
            }
            Predicate::In {
                field,
                values,
                negated,
            } => match Self::get_field_value(row, field) {
                Some(fv) => values.iter().any(|v| Self::values_equal(fv, v)) != *negated,
                None => *negated,
            },
            Predicate::Null { field, negated } => {
                let is_null = matches!(Self::get_field_value(row, field), None | Some(Value::Null));
                is_null != *negated
            }
        }
    }

    fn get_field_value<'a>(row: &'a [(String, Value)], field: &str) -> Option<&'a Value> {
        row.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    fn ordered(a: &Value, b: &Value, test: fn(Ordering) -> bool) -> bool {
        Self::compare_values(a, b).map(test).unwrap_or(false)
    }

    /// Check if two values are equal, widening integers.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Int32(a), Value::Int64(b)) => (*a as i64) == *b,
            (Value::Int64(a), Value::Int32(b)) => *a == (*b as i64),
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            _ => false,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int64(b)) => Some((*a as i64).cmp(b)),
            (Value::Int64(a), Value::Int32(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}
