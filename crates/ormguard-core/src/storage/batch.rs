//! Atomic write batches.

use ormguard_proto::Value;

use super::{RowKey, Version};
use crate::error::{Error, ReferentialError};

/// A single conditional row write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a new row; fails if the key is occupied.
    Insert {
        /// Entity name.
        entity: String,
        /// Row key.
        key: RowKey,
        /// Full row contents in storage form.
        fields: Vec<(String, Value)>,
    },
    /// Replace a row, provided it is still at `expected`.
    Update {
        /// Entity name.
        entity: String,
        /// Row key.
        key: RowKey,
        /// Version the writer read.
        expected: Version,
        /// Full row contents in storage form.
        fields: Vec<(String, Value)>,
    },
    /// Remove a row, provided it is still at `expected`.
    Delete {
        /// Entity name.
        entity: String,
        /// Row key.
        key: RowKey,
        /// Version the writer read.
        expected: Version,
    },
    /// Record that a `child` row now references this parent row.
    ///
    /// The parent must exist. Its link stamp is bumped; its version and
    /// contents are left alone.
    Link {
        /// Parent entity name.
        entity: String,
        /// Parent key.
        key: RowKey,
        /// Relation the reference goes through.
        relation: String,
        /// Entity of the referencing row.
        child: String,
    },
    /// Require a row's link stamp to be unchanged since it was read.
    Guard {
        /// Entity name.
        entity: String,
        /// Row key.
        key: RowKey,
        /// Link stamp the planner read.
        links: Version,
    },
}

/// Version and link stamp of a row as currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowState {
    /// Row version.
    pub version: Version,
    /// Bumped whenever a new reference to the row is written.
    pub links: Version,
}

/// What a store must do for one op once it has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// Write the op's fields with this state.
    Write(RowState),
    /// Keep the row's contents and version, store a new link stamp.
    Relink(Version),
    /// Leave the row untouched.
    Keep,
    /// Remove the row.
    Remove,
}

impl WriteOp {
    /// Entity this op targets.
    pub fn entity(&self) -> &str {
        match self {
            WriteOp::Insert { entity, .. }
            | WriteOp::Update { entity, .. }
            | WriteOp::Delete { entity, .. }
            | WriteOp::Link { entity, .. }
            | WriteOp::Guard { entity, .. } => entity,
        }
    }

    /// Key this op targets.
    pub fn key(&self) -> &RowKey {
        match self {
            WriteOp::Insert { key, .. }
            | WriteOp::Update { key, .. }
            | WriteOp::Delete { key, .. }
            | WriteOp::Link { key, .. }
            | WriteOp::Guard { key, .. } => key,
        }
    }

    /// Row contents written by this op, if any.
    pub fn fields(&self) -> Option<&[(String, Value)]> {
        match self {
            WriteOp::Insert { fields, .. } | WriteOp::Update { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Check this op against the row's current state.
    pub fn resolve(&self, current: Option<RowState>) -> Result<Resolved, Error> {
        match self {
            WriteOp::Insert { entity, key, .. } => match current {
                Some(_) => Err(Error::Uniqueness {
                    entity: entity.clone(),
                    key: key.clone(),
                }),
                None => Ok(Resolved::Write(RowState {
                    version: Version::next_after(None),
                    links: Version::new(0),
                })),
            },
            WriteOp::Update {
                entity,
                key,
                expected,
                ..
            } => {
                let state = check_expected(entity, key, *expected, current)?;
                Ok(Resolved::Write(RowState {
                    version: Version::next_after(Some(state.version)),
                    links: state.links,
                }))
            }
            WriteOp::Delete {
                entity,
                key,
                expected,
            } => {
                check_expected(entity, key, *expected, current)?;
                Ok(Resolved::Remove)
            }
            WriteOp::Link {
                entity,
                key,
                relation,
                child,
            } => match current {
                Some(state) => Ok(Resolved::Relink(Version::next_after(Some(state.links)))),
                None => Err(ReferentialError::MissingParent {
                    relation: relation.clone(),
                    entity: child.clone(),
                    parent_entity: entity.clone(),
                    parent_key: key.clone(),
                }
                .into()),
            },
            WriteOp::Guard { entity, key, links } => match current {
                Some(state) if state.links == *links => Ok(Resolved::Keep),
                other => Err(Error::Conflict {
                    entity: entity.clone(),
                    key: key.clone(),
                    expected: *links,
                    actual: other.map(|s| s.links),
                }),
            },
        }
    }
}

fn check_expected(
    entity: &str,
    key: &RowKey,
    expected: Version,
    current: Option<RowState>,
) -> Result<RowState, Error> {
    match current {
        Some(state) if state.version == expected => Ok(state),
        other => Err(Error::Conflict {
            entity: entity.to_string(),
            key: key.clone(),
            expected,
            actual: other.map(|s| s.version),
        }),
    }
}

/// An ordered list of writes applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an insert.
    pub fn insert(
        &mut self,
        entity: impl Into<String>,
        key: RowKey,
        fields: Vec<(String, Value)>,
    ) -> &mut Self {
        self.ops.push(WriteOp::Insert {
            entity: entity.into(),
            key,
            fields,
        });
        self
    }

    /// Queue a conditional update.
    pub fn update(
        &mut self,
        entity: impl Into<String>,
        key: RowKey,
        expected: Version,
        fields: Vec<(String, Value)>,
    ) -> &mut Self {
        self.ops.push(WriteOp::Update {
            entity: entity.into(),
            key,
            expected,
            fields,
        });
        self
    }

    /// Queue a conditional delete.
    pub fn delete(&mut self, entity: impl Into<String>, key: RowKey, expected: Version) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            entity: entity.into(),
            key,
            expected,
        });
        self
    }

    /// Queue a parent reference check.
    pub fn link(
        &mut self,
        entity: impl Into<String>,
        key: RowKey,
        relation: impl Into<String>,
        child: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(WriteOp::Link {
            entity: entity.into(),
            key,
            relation: relation.into(),
            child: child.into(),
        });
        self
    }

    /// Queue a link stamp check.
    pub fn guard(&mut self, entity: impl Into<String>, key: RowKey, links: Version) -> &mut Self {
        self.ops.push(WriteOp::Guard {
            entity: entity.into(),
            key,
            links,
        });
        self
    }

    /// Queued operations.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
