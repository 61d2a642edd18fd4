//! Error types for run orchestration.

use ldapsync_artifact::ArtifactError;
use ldapsync_delivery::DeliveryError;
use ldapsync_directory::DirectoryError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Invalid settings. Detected before any external system is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The directory section failed validation.
    #[error("directory settings: {0}")]
    Directory(String),

    /// The command needs destinations of a kind none were configured for.
    #[error("no {kind} destinations configured")]
    NoDestinations { kind: &'static str },

    /// A single setting has an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// At least one web destination did not answer the probe with 200.
    #[error("{unreachable} of {total} web destinations unreachable")]
    Unreachable { unreachable: usize, total: usize },
}

impl EngineError {
    /// The error followed by each of its sources, outermost first.
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        chain
    }
}
