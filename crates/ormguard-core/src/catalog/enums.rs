//! Enumerated field mappings.
//!
//! Each enumerated field carries a closed table of
//! `(internal member, external representation)` pairs. Only the external
//! string is ever persisted; reads translate it back to the internal member
//! and fail on anything outside the table.

use rkyv::{Archive, Deserialize, Serialize};

/// One member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct EnumMember {
    /// Name the application uses (e.g. `MALE`).
    pub internal: String,
    /// Representation written to storage (e.g. `male`).
    pub external: String,
}

/// A closed bidirectional mapping for an enumerated field.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct EnumDef {
    /// Name of the enum type.
    pub name: String,
    /// Declared members.
    pub members: Vec<EnumMember>,
}

impl EnumDef {
    /// Create an enum with no members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a member mapping an internal name to its external representation.
    pub fn with_member(mut self, internal: impl Into<String>, external: impl Into<String>) -> Self {
        self.members.push(EnumMember {
            internal: internal.into(),
            external: external.into(),
        });
        self
    }

    /// External representation of an internal member.
    pub fn external_of(&self, internal: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.internal == internal)
            .map(|m| m.external.as_str())
    }

    /// Internal member for an external representation.
    pub fn internal_of(&self, external: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.external == external)
            .map(|m| m.internal.as_str())
    }

    /// First internal or external value declared more than once.
    pub(crate) fn first_duplicate(&self) -> Option<&str> {
        for (i, m) in self.members.iter().enumerate() {
            for other in &self.members[..i] {
                if other.internal == m.internal {
                    return Some(&m.internal);
                }
                if other.external == m.external {
                    return Some(&m.external);
                }
            }
        }
        None
    }
}
