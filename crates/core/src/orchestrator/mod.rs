//! Batch conversion orchestration.
//!
//! The orchestrator walks a list of submission files sequentially and
//! drives each one through the conversion pipeline:
//! - **Submit**: upload the manuscript to the conversion service
//! - **Poll**: wait for a terminal job status
//! - **Attach**: unpack the result archive and attach the galley
//!
//! Progress is durable and cancellation cooperative; see the `progress`
//! module.

mod config;
mod runner;
mod types;

pub use config::BatchConfig;
pub use runner::BatchOrchestrator;
pub use types::{BatchError, BatchItem, BatchOutcome, BatchRequest, TriggerError, TriggeredJob};
