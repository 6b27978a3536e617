//! Durable tracking of conversion jobs.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteJobTracker;
pub use store::*;
