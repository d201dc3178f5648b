//! Client-side copies of the backend-owned resources.

pub mod query;
pub mod store;

pub use query::{JobPage, JobQuery, SortKey, SortOrder};
pub use store::{RefreshOutcome, ResourceStore, Snapshot, Summary};
