//! Error types for directory access.

use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur while talking to the directory server.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be reached.
    #[error("directory unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    /// The server answered the bind with a non-success result code.
    #[error("bind failed for {bind_dn} (result code {code}): {message}")]
    BindFailed {
        bind_dn: String,
        code: u32,
        message: String,
    },

    /// The search could not be started or finished with an error.
    #[error("search failed: {0}")]
    SearchFailed(String),

    /// An operation exceeded the configured timeout.
    #[error("directory operation timed out")]
    Timeout,

    /// Invalid configuration.
    #[error("invalid directory configuration: {0}")]
    Config(String),
}

impl DirectoryError {
    pub(crate) fn unavailable(url: &str, err: ldap3::LdapError) -> Self {
        if matches!(err, ldap3::LdapError::Timeout { .. }) {
            return Self::Timeout;
        }
        Self::Unavailable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn unbind(url: &str, err: ldap3::LdapError) -> Self {
        Self::Unavailable {
            url: url.to_string(),
            reason: format!("unbind failed: {err}"),
        }
    }

    pub(crate) fn search(err: ldap3::LdapError) -> Self {
        if matches!(err, ldap3::LdapError::Timeout { .. }) {
            return Self::Timeout;
        }
        Self::SearchFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbind_failure_names_the_server() {
        let err = DirectoryError::unbind("ldaps://dc01.example.com:636", ldap3::LdapError::EndOfStream);
        let message = err.to_string();
        assert!(message.starts_with("directory unavailable at ldaps://dc01.example.com:636: unbind failed"));
    }
}
