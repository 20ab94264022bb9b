//! Referential actions and write-time foreign-key checks.

mod cascade;
mod validator;

pub use cascade::{DeletePlan, DeletePlanner, PlannedRow, RemovedRow};
pub use validator::{ForeignKeyValidator, ParentRef};
