//! Types for result archive handling.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from unpacking a result archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive is missing, empty, corrupt, or contains unsafe paths.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of an extracted archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// JATS XML document.
    Document,
    /// Image referenced by the document (dependent file).
    Media,
    /// Rendered PDF galley.
    Pdf,
    /// Rendered ePub galley.
    Epub,
    /// Anything else the service put in the archive.
    Other,
}

/// One file unpacked from the result archive.
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    /// Absolute path inside the extraction directory.
    pub path: PathBuf,
    /// File name without directories.
    pub name: String,
    pub kind: EntryKind,
}

/// An unpacked result archive.
///
/// Owns its extraction directory; dropping an undisposed value removes
/// the directory so temporary files never outlive the item that
/// produced them.
#[derive(Debug)]
pub struct Extraction {
    dir: PathBuf,
    entries: Vec<ExtractedEntry>,
    disposed: bool,
}

impl Extraction {
    pub(crate) fn new(dir: PathBuf, entries: Vec<ExtractedEntry>) -> Self {
        Self {
            dir,
            entries,
            disposed: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[ExtractedEntry] {
        &self.entries
    }

    /// The XML document to attach as the galley file.
    /// The first document entry wins when the archive holds several.
    pub fn primary_document(&self) -> Option<&ExtractedEntry> {
        self.entries.iter().find(|e| e.kind == EntryKind::Document)
    }

    /// Image files to attach as dependents of the XML document.
    pub fn media_entries(&self) -> Vec<&ExtractedEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Media)
            .collect()
    }

    /// Remove the extraction directory.
    pub fn dispose(mut self) -> Result<(), ArchiveError> {
        self.disposed = true;
        std::fs::remove_dir_all(&self.dir)?;
        Ok(())
    }
}

impl Drop for Extraction {
    fn drop(&mut self) {
        if !self.disposed && self.dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                warn!(dir = %self.dir.display(), error = %e, "failed to clean up extraction dir");
            }
        }
    }
}
