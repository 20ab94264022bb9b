//! ORMGuard shared types.
//!
//! This crate defines the values callers hand to the data-access core and the
//! filter IR used to select rows.
//!
//! # Modules
//!
//! - [`value`] - Runtime values for fields, keys and filter literals
//! - [`filter`] - Filter expressions evaluated against rows
//!
//! All types derive `rkyv` and `serde` traits so they can be persisted or
//! shipped over whatever transport an embedding application uses.

pub mod filter;
pub mod value;

pub use filter::{CompareOp, Filter, FilterExpr, Predicate};
pub use value::Value;
