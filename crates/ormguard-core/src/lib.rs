//! ORMGuard Core - catalog, relationship graph and guarded CRUD.
//!
//! This crate provides an embeddable data-access core: entity shapes and
//! relations are registered once at startup, and every create, read, update
//! and delete afterwards goes through optimistic version checks and the
//! referential actions declared on each relation.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod database;
pub mod error;
pub mod executor;
pub mod occ;
pub mod query;
pub mod storage;

pub use catalog::{
    Cardinality, Catalog, DefaultValue, DeleteBehavior, Edge, EdgeKind, EntityDef, EnumDef,
    FieldDef, FieldType, RelationDef, RelationGraph, ScalarType, SchemaBundle,
};
pub use config::{Backend, DatabaseConfig};
pub use constraint::{DeletePlan, PlannedRow, RemovedRow};
pub use database::Database;
pub use error::{ConfigError, Error, ReferentialError, ShapeError};
pub use executor::CrudExecutor;
pub use query::{Fetch, Row};
pub use storage::{MemoryStore, RowKey, RowStore, SledStore, StorageConfig, Version};

/// Re-export shared value and filter types.
pub use ormguard_proto as proto;
pub use ormguard_proto::{Filter, Predicate, Value};
