//! Relation definitions between entities.
//!
//! Relations are declared once, on the parent side. The child's
//! back-reference is derived by the [`RelationGraph`](super::RelationGraph).

use rkyv::{Archive, Deserialize, Serialize};

/// Cardinality of a relation, seen from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum Cardinality {
    /// The parent has at most one child.
    OneToOne,
    /// The parent has any number of children.
    OneToMany,
}

/// Behavior when a parent row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum DeleteBehavior {
    /// Delete related rows in the same operation.
    Cascade,
    /// Reject the delete while related rows exist.
    Restrict,
}

/// One equality condition of a join: `parent.parent_field == child.child_field`.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct JoinPair {
    /// Field on the parent entity.
    pub parent_field: String,
    /// Field on the child entity.
    pub child_field: String,
}

/// A relation definition between two entities.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name; also the parent-side edge name.
    pub name: String,
    /// Parent (referenced) entity.
    pub parent: String,
    /// Child (referencing) entity.
    pub child: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Join condition, a conjunction of field equalities.
    pub join: Vec<JoinPair>,
    /// Delete behavior; must be set before registration.
    pub on_delete: Option<DeleteBehavior>,
    /// Name of the derived child-side edge.
    pub inverse: Option<String>,
    /// Whether the join is a declared foreign key checked on write.
    pub foreign_key: bool,
}

impl RelationDef {
    fn new(
        name: impl Into<String>,
        cardinality: Cardinality,
        parent: impl Into<String>,
        parent_field: impl Into<String>,
        child: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            child: child.into(),
            cardinality,
            join: vec![JoinPair {
                parent_field: parent_field.into(),
                child_field: child_field.into(),
            }],
            on_delete: None,
            inverse: None,
            foreign_key: true,
        }
    }

    /// Create a one-to-one relation.
    pub fn one_to_one(
        name: impl Into<String>,
        parent: impl Into<String>,
        parent_field: impl Into<String>,
        child: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self::new(name, Cardinality::OneToOne, parent, parent_field, child, child_field)
    }

    /// Create a one-to-many relation.
    pub fn one_to_many(
        name: impl Into<String>,
        parent: impl Into<String>,
        parent_field: impl Into<String>,
        child: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self::new(name, Cardinality::OneToMany, parent, parent_field, child, child_field)
    }

    /// Add another join condition.
    pub fn with_join(mut self, parent_field: impl Into<String>, child_field: impl Into<String>) -> Self {
        self.join.push(JoinPair {
            parent_field: parent_field.into(),
            child_field: child_field.into(),
        });
        self
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = Some(on_delete);
        self
    }

    /// Name the child-side back-reference.
    pub fn with_inverse(mut self, name: impl Into<String>) -> Self {
        self.inverse = Some(name.into());
        self
    }

    /// Mark the join as an application-level equality, not a foreign key.
    pub fn without_foreign_key(mut self) -> Self {
        self.foreign_key = false;
        self
    }

    /// Name of the child-side edge.
    ///
    /// Defaults to the parent entity name in snake case.
    pub fn inverse_name(&self) -> String {
        self.inverse
            .clone()
            .unwrap_or_else(|| snake_case(&self.parent))
    }

    /// Parent-side join fields, in declaration order.
    pub fn parent_fields(&self) -> Vec<String> {
        self.join.iter().map(|p| p.parent_field.clone()).collect()
    }

    /// Child-side join fields, in declaration order.
    pub fn child_fields(&self) -> Vec<String> {
        self.join.iter().map(|p| p.child_field.clone()).collect()
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
