//! Submission lookups and galley attachment.

mod fs;
mod traits;
mod types;

pub use fs::{FsGalleyAttacher, FsSubmissionRepository};
pub use traits::*;
pub use types::*;
