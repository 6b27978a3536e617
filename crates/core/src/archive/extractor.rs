//! Result archive extraction.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use super::{ArchiveError, EntryKind, ExtractedEntry, Extraction};

static MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(png|jpe?g|gif|svg|webp)$").unwrap()
});

/// Unpacks result archives from the conversion service.
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Unpack `archive_path` into a sibling directory and classify the
    /// entries. The archive must exist, be non-empty, and contain at
    /// least one file.
    pub fn extract(&self, archive_path: &Path) -> Result<Extraction, ArchiveError> {
        let metadata = std::fs::metadata(archive_path).map_err(|e| {
            ArchiveError::ExtractionFailed(format!(
                "archive not readable: {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        if metadata.len() == 0 {
            return Err(ArchiveError::ExtractionFailed(format!(
                "archive is empty: {}",
                archive_path.display()
            )));
        }

        let file = File::open(archive_path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| ArchiveError::ExtractionFailed(format!("corrupt archive: {}", e)))?;

        let dest_dir = extraction_dir(archive_path);
        std::fs::create_dir_all(&dest_dir)?;

        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| ArchiveError::ExtractionFailed(format!("corrupt entry: {}", e)))?;

            if entry.is_dir() {
                continue;
            }

            // enclosed_name rejects paths that would escape the target dir
            let relative = entry.enclosed_name().ok_or_else(|| {
                ArchiveError::ExtractionFailed(format!("unsafe entry path: {}", entry.name()))
            })?;

            let out_path = dest_dir.join(&relative);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut out_file = File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out_file)?;

            let name = out_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let kind = classify(&name);

            entries.push(ExtractedEntry {
                path: out_path,
                name,
                kind,
            });
        }

        if entries.is_empty() {
            // Remove the dir before bailing so nothing is left behind.
            let _ = std::fs::remove_dir_all(&dest_dir);
            return Err(ArchiveError::ExtractionFailed(format!(
                "archive contains no files: {}",
                archive_path.display()
            )));
        }

        debug!(
            archive = %archive_path.display(),
            entries = entries.len(),
            "archive extracted"
        );
        Ok(Extraction::new(dest_dir, entries))
    }
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn extraction_dir(archive_path: &Path) -> std::path::PathBuf {
    let stem = archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    archive_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}-extracted", stem))
}

/// Classify an entry by file name.
fn classify(name: &str) -> EntryKind {
    let lower = name.to_lowercase();
    if lower.ends_with(".xml") {
        EntryKind::Document
    } else if MEDIA_RE.is_match(name) {
        EntryKind::Media
    } else if lower.ends_with(".pdf") {
        EntryKind::Pdf
    } else if lower.ends_with(".epub") {
        EntryKind::Epub
    } else {
        EntryKind::Other
    }
}
