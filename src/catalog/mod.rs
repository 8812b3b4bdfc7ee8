//! Storage-independent catalog rules

pub mod query;
pub mod sync;

pub use query::ListSpec;
pub use sync::{SchemaPolicy, SyncPlan};
