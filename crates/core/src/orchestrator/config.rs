//! Batch orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::BatchSectionConfig;
use crate::ots::TargetOperation;

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory for per-item scratch files (downloaded archives,
    /// extraction output). One subdirectory per item, removed after
    /// the item finishes.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// How often to poll the conversion service (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up polling a single job after this long (milliseconds).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Pause after a failed item before starting the next (milliseconds).
    /// Gives a struggling service room to recover between items.
    #[serde(default = "default_failure_pause")]
    pub failure_pause_ms: u64,

    /// Conversion target submitted for every batch item. Defaults to
    /// full galley regeneration.
    #[serde(default = "default_batch_target")]
    pub batch_target: TargetOperation,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_poll_interval() -> u64 {
    3000 // 3 seconds
}

fn default_poll_timeout() -> u64 {
    600_000 // 10 minutes
}

fn default_failure_pause() -> u64 {
    5000 // 5 seconds
}

fn default_batch_target() -> TargetOperation {
    TargetOperation::GalleyGenerate
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            poll_interval_ms: default_poll_interval(),
            poll_timeout_ms: default_poll_timeout(),
            failure_pause_ms: default_failure_pause(),
            batch_target: default_batch_target(),
        }
    }
}

impl From<&BatchSectionConfig> for BatchConfig {
    fn from(section: &BatchSectionConfig) -> Self {
        Self {
            work_dir: section.spool_dir.join("work"),
            poll_interval_ms: section.poll_interval_ms,
            poll_timeout_ms: section.poll_timeout_ms,
            failure_pause_ms: section.failure_pause_ms,
            batch_target: section.batch_target,
        }
    }
}
