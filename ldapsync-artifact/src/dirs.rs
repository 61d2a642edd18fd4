//! Backup and log directory handling, and timestamped file names.

use crate::error::{ArtifactError, ArtifactResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Extension of sync artifacts.
pub const ARTIFACT_EXTENSION: &str = ".json";

/// Extension of error logs.
pub const LOG_EXTENSION: &str = ".log";

/// Creates `dir` if needed and removes everything inside it.
///
/// Returns the number of entries removed.
pub fn prepare_backup_dir(dir: &Path) -> ArtifactResult<usize> {
    let prepare_err = |source| ArtifactError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(prepare_err)?;

    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(prepare_err)? {
        let entry = entry.map_err(prepare_err)?;
        let path = entry.path();
        if entry.file_type().map_err(prepare_err)?.is_dir() {
            fs::remove_dir_all(&path).map_err(prepare_err)?;
        } else {
            fs::remove_file(&path).map_err(prepare_err)?;
        }
        debug!(path = %path.display(), "Removed previous backup entry");
        removed += 1;
    }
    Ok(removed)
}

/// Creates `dir` and its parents if they do not exist.
pub fn ensure_dir(dir: &Path) -> ArtifactResult<()> {
    fs::create_dir_all(dir).map_err(|source| ArtifactError::Directory {
        path: dir.to_path_buf(),
        source,
    })
}

/// File name for the current UTC time, e.g. `20240131_235959_123.json`.
#[must_use]
pub fn timestamped_file_name(extension: &str) -> String {
    timestamped_file_name_at(Utc::now(), extension)
}

/// File name for a given instant. Names sort in time order.
#[must_use]
pub fn timestamped_file_name_at(at: DateTime<Utc>, extension: &str) -> String {
    format!("{}{extension}", at.format("%Y%m%d_%H%M%S_%3f"))
}
