//! Result archive unpacking and entry classification.

mod extractor;
mod types;

pub use extractor::ArchiveExtractor;
pub use types::*;
