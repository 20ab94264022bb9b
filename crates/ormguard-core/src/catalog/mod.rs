//! Entity catalog and relationship graph.
//!
//! Declarations ([`EntityDef`], [`RelationDef`]) are collected into a
//! [`SchemaBundle`] and validated once at registration into a [`Catalog`]
//! and a [`RelationGraph`]. Both are read-only afterwards.

mod catalog;
mod entity;
mod enums;
mod field;
mod graph;
mod relation;
mod schema;
mod types;

pub use catalog::Catalog;
pub use entity::EntityDef;
pub use enums::{EnumDef, EnumMember};
pub use field::{DefaultValue, FieldDef};
pub use graph::{Edge, EdgeKind, RelationGraph};
pub use relation::{Cardinality, DeleteBehavior, JoinPair, RelationDef};
pub use schema::SchemaBundle;
pub use types::{FieldType, ScalarType};
