//! Artifact output for ldapsync.
//!
//! Writes the per-run JSON array file incrementally, one record at a time,
//! and manages the backup and log directories around it.
//!
//! The array is always syntactically complete: separators are written
//! *before* every element after the first, so no trailing comma can exist,
//! and the file only appears under its final name once the closing bracket
//! is on disk.

mod dirs;
mod error;
mod writer;

pub use dirs::{
    ensure_dir, prepare_backup_dir, timestamped_file_name, timestamped_file_name_at,
    ARTIFACT_EXTENSION, LOG_EXTENSION,
};
pub use error::{ArtifactError, ArtifactResult};
pub use writer::{write_artifact, Artifact, ArtifactShape, ArtifactWriter, INDENT};
