//! Filesystem-backed submission collaborators.
//!
//! Spool layout:
//!
//! ```text
//! <spool>/<submission_id>/meta.json            submission metadata
//! <spool>/<submission_id>/files/<file_id>/rN.<ext>   file revisions
//! <spool>/<submission_id>/galleys/             attached conversion results
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::archive::Extraction;

use super::traits::{GalleyAttacher, SubmissionRepository};
use super::types::{AttachedGalley, Submission, SubmissionError, SubmissionFile};

/// Submission repository reading from a spool directory.
pub struct FsSubmissionRepository {
    spool_dir: PathBuf,
}

/// Submission metadata stored in meta.json.
#[derive(serde::Deserialize)]
struct SubmissionMeta {
    journal_id: String,
    #[serde(default)]
    title: Option<String>,
}

impl FsSubmissionRepository {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
        }
    }

    fn submission_dir(&self, id: &str) -> PathBuf {
        self.spool_dir.join(id)
    }
}

#[async_trait]
impl SubmissionRepository for FsSubmissionRepository {
    async fn get_submission(&self, id: &str) -> Result<Submission, SubmissionError> {
        let meta_path = self.submission_dir(id).join("meta.json");
        let bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SubmissionError::NotFound(format!("submission {}", id)));
            }
            Err(e) => return Err(e.into()),
        };

        let meta: SubmissionMeta = serde_json::from_slice(&bytes)
            .map_err(|e| SubmissionError::NotFound(format!("submission {}: bad meta: {}", id, e)))?;

        Ok(Submission {
            id: id.to_string(),
            journal_id: meta.journal_id,
            title: meta.title,
        })
    }

    async fn latest_file_revision(&self, file_id: &str) -> Result<SubmissionFile, SubmissionError> {
        // File ids are unique across submissions: scan each submission
        // dir for a matching files/<file_id> directory.
        let mut submissions = match fs::read_dir(&self.spool_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SubmissionError::NotFound(format!("file {}", file_id)));
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = submissions.next_entry().await? {
            let file_dir = entry.path().join("files").join(file_id);
            if !fs::try_exists(&file_dir).await.unwrap_or(false) {
                continue;
            }

            let submission_id = entry.file_name().to_string_lossy().to_string();
            return latest_revision_in(&file_dir, file_id, &submission_id).await;
        }

        Err(SubmissionError::NotFound(format!("file {}", file_id)))
    }
}

/// Pick the highest revision (rN.*) in a file directory.
async fn latest_revision_in(
    file_dir: &Path,
    file_id: &str,
    submission_id: &str,
) -> Result<SubmissionFile, SubmissionError> {
    let mut best: Option<(u32, PathBuf, String)> = None;

    let mut entries = fs::read_dir(file_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(stem) = name.split('.').next() else {
            continue;
        };
        let Some(rev) = stem.strip_prefix('r').and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };

        if best.as_ref().map(|(r, _, _)| rev > *r).unwrap_or(true) {
            best = Some((rev, entry.path(), name));
        }
    }

    let (revision, path, original_name) =
        best.ok_or_else(|| SubmissionError::NotFound(format!("file {}: no revisions", file_id)))?;

    Ok(SubmissionFile {
        id: file_id.to_string(),
        submission_id: submission_id.to_string(),
        revision,
        path,
        original_name,
    })
}

/// Galley attacher writing into the spool directory.
pub struct FsGalleyAttacher {
    spool_dir: PathBuf,
}

impl FsGalleyAttacher {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
        }
    }

    /// Move a file into place, falling back to copy when the rename
    /// crosses filesystems.
    async fn place(source: &Path, destination: &Path) -> Result<(), SubmissionError> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(()),
            Err(e)
                if e.kind() == std::io::ErrorKind::CrossesDevices
                    || e.raw_os_error() == Some(18) =>
            {
                fs::copy(source, destination).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl GalleyAttacher for FsGalleyAttacher {
    async fn attach(
        &self,
        submission: &Submission,
        file: &SubmissionFile,
        extraction: &Extraction,
        base_name: &str,
    ) -> Result<AttachedGalley, SubmissionError> {
        let primary = extraction.primary_document().ok_or_else(|| {
            SubmissionError::AttachFailed(format!(
                "no XML document in conversion result for file {}",
                file.id
            ))
        })?;

        let galley_dir = self.spool_dir.join(&submission.id).join("galleys");
        fs::create_dir_all(&galley_dir).await?;

        let xml_path = galley_dir.join(format!("{}.xml", base_name));
        Self::place(&primary.path, &xml_path).await?;

        // Media files become dependents of the XML, grouped under a
        // directory with the same base name.
        let media_entries = extraction.media_entries();
        let mut media_paths = Vec::with_capacity(media_entries.len());
        if !media_entries.is_empty() {
            let media_dir = galley_dir.join(base_name);
            fs::create_dir_all(&media_dir).await?;
            for entry in media_entries {
                let dest = media_dir.join(&entry.name);
                Self::place(&entry.path, &dest).await?;
                debug!(media = %entry.name, "dependent file attached");
                media_paths.push(dest);
            }
        }

        info!(
            submission_id = %submission.id,
            file_id = %file.id,
            base_name,
            media = media_paths.len(),
            "galley attached"
        );

        Ok(AttachedGalley {
            base_name: base_name.to_string(),
            xml_path,
            media_paths,
        })
    }
}
