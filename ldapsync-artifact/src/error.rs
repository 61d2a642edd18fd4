//! Error types for artifact output.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Errors that can occur while writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// IO error while writing the artifact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A working directory could not be created or cleared.
    #[error("cannot prepare directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
