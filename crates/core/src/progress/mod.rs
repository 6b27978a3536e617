//! Durable batch progress with cooperative cancellation.

mod file_store;
mod types;

pub use file_store::FileProgressStore;
pub use types::*;
