//! Read path: decoded rows, filters, joins and lazy fetches.

mod fetch;
mod filter;
pub(crate) mod related;
mod row;

pub use fetch::{Fetch, FetchIter};
pub use filter::{normalize_filter, FilterEvaluator};
pub use row::Row;
