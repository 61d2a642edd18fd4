//! Error types for delivery.

use thiserror::Error;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors that can occur while delivering to a destination.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Could not open a connection to the destination.
    #[error("cannot connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// The server's host key did not pass verification.
    #[error("host key for {target} rejected: {reason}")]
    HostKeyRejected { target: String, reason: String },

    /// The destination rejected the credentials.
    #[error("authentication failed for {user} at {target}")]
    Auth { target: String, user: String },

    /// The remote target directory does not exist.
    #[error("remote directory {path} missing on {target}")]
    RemoteDirectoryMissing { target: String, path: String },

    /// Copying data to the destination failed.
    #[error("transfer to {target} failed: {reason}")]
    Transfer { target: String, reason: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The web back end answered with something other than 200.
    #[error("{target} answered with status {status}")]
    Status { target: String, status: u16 },

    /// Some destinations were not delivered.
    #[error("delivery incomplete: {failed} of {total} destinations not delivered")]
    Incomplete { failed: usize, total: usize },

    /// Invalid destination configuration.
    #[error("invalid destination: {0}")]
    Config(String),

    /// Local IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    /// The HTTP status carried by the error, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
