//! Filter IR used by bulk reads.
//!
//! Filters are kept one level deep (a single predicate, or a flat
//! conjunction/disjunction of predicates) so the archived form stays
//! non-recursive.

use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Comparison operator for a single field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum CompareOp {
    /// Field equals value.
    Eq,
    /// Field not equals value.
    Ne,
    /// Field less than value.
    Lt,
    /// Field less than or equal to value.
    Le,
    /// Field greater than value.
    Gt,
    /// Field greater than or equal to value.
    Ge,
}

/// A predicate over one field of a row.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum Predicate {
    /// Ordered or equality comparison against a literal.
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Membership in a literal set; `negated` turns it into NOT IN.
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Null test; `negated` turns it into IS NOT NULL.
    Null { field: String, negated: bool },
}

impl Predicate {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Create an equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Create a not-equal predicate.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// Create a less-than predicate.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// Create a less-than-or-equal predicate.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// Create a greater-than predicate.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// Create a greater-than-or-equal predicate.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// Create an IN predicate.
    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
            negated: false,
        }
    }

    /// Create a NOT IN predicate.
    pub fn none_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
            negated: true,
        }
    }

    /// Create an IS NULL predicate.
    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::Null {
            field: field.into(),
            negated: false,
        }
    }

    /// Create an IS NOT NULL predicate.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Predicate::Null {
            field: field.into(),
            negated: true,
        }
    }

    /// Name of the field this predicate tests.
    pub fn field(&self) -> &str {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::In { field, .. }
            | Predicate::Null { field, .. } => field,
        }
    }

    /// Mutable access to every literal in the predicate.
    pub fn literals_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Predicate::Compare { value, .. } => vec![value],
            Predicate::In { values, .. } => values.iter_mut().collect(),
            Predicate::Null { .. } => vec![],
        }
    }
}

/// Top-level filter expression.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum FilterExpr {
    /// A single predicate.
    Match(Predicate),
    /// Every predicate must hold. An empty list matches everything.
    All(Vec<Predicate>),
    /// At least one predicate must hold. An empty list matches nothing.
    Any(Vec<Predicate>),
}

/// A filter applied to the rows of one entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Filter {
    /// The filter expression.
    pub expression: FilterExpr,
}

impl Filter {
    /// Create a filter from an expression.
    pub fn new(expression: FilterExpr) -> Self {
        Self { expression }
    }

    /// Conjunction of predicates.
    pub fn all(predicates: Vec<Predicate>) -> Self {
        Self::new(FilterExpr::All(predicates))
    }

    /// Disjunction of predicates.
    pub fn any(predicates: Vec<Predicate>) -> Self {
        Self::new(FilterExpr::Any(predicates))
    }

    /// Iterate over every predicate in the filter.
    pub fn predicates(&self) -> &[Predicate] {
        match &self.expression {
            FilterExpr::Match(p) => std::slice::from_ref(p),
            FilterExpr::All(ps) | FilterExpr::Any(ps) => ps,
        }
    }

    /// Mutable variant of [`Filter::predicates`].
    pub fn predicates_mut(&mut self) -> &mut [Predicate] {
        match &mut self.expression {
            FilterExpr::Match(p) => std::slice::from_mut(p),
            FilterExpr::All(ps) | FilterExpr::Any(ps) => ps,
        }
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Self::new(FilterExpr::Match(predicate))
    }
}
