//! Directory connection and search configuration.

use crate::error::{DirectoryError, DirectoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Attributes requested when none are configured.
pub const DEFAULT_ATTRIBUTES: &[&str] = &[
    "distinguishedName",
    "sAMAccountName",
    "givenName",
    "sn",
    "mail",
    "department",
];

/// Entries per search page when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// How to reach the directory and what to search for.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub host: String,
    pub port: u16,
    /// Connect with `ldaps://` instead of `ldap://`.
    pub use_tls: bool,
    pub bind_dn: String,
    pub bind_password: String,
    /// Base DN of the subtree search.
    pub search_base: String,
    /// LDAP filter, e.g. `(&(objectClass=user)(mail=*))`.
    pub search_filter: String,
    /// Attributes to request, in output order.
    pub attributes: Vec<String>,
    /// Entries per page for both the paged-results control and delivery pages.
    pub page_size: u32,
    /// Applies to connecting, binding and every search round trip.
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 389,
            use_tls: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            search_base: String::new(),
            search_filter: "(objectClass=person)".to_string(),
            attributes: DEFAULT_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
        }
    }
}

impl DirectoryConfig {
    /// The server URL derived from host, port and TLS flag.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks the configuration before any connection is attempted.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.host.trim().is_empty() {
            return Err(DirectoryError::Config("host is empty".to_string()));
        }
        if self.search_base.trim().is_empty() {
            return Err(DirectoryError::Config("search base is empty".to_string()));
        }
        if self.search_filter.trim().is_empty() {
            return Err(DirectoryError::Config("search filter is empty".to_string()));
        }
        if self.attributes.is_empty() {
            return Err(DirectoryError::Config("attribute list is empty".to_string()));
        }
        for (i, name) in self.attributes.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(DirectoryError::Config(format!("attribute #{i} is empty")));
            }
            if self.attributes[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(DirectoryError::Config(format!(
                    "attribute {name} is listed more than once"
                )));
            }
        }
        if self.page_size == 0 || i32::try_from(self.page_size).is_err() {
            return Err(DirectoryError::Config(format!(
                "page size {} is out of range",
                self.page_size
            )));
        }
        if self.timeout_secs == 0 {
            return Err(DirectoryError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .field("search_base", &self.search_base)
            .field("search_filter", &self.search_filter)
            .field("attributes", &self.attributes)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DirectoryConfig {
        DirectoryConfig {
            search_base: "dc=example,dc=com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn url_follows_tls_flag() {
        let mut config = valid();
        assert_eq!(config.url(), "ldap://localhost:389");
        config.use_tls = true;
        config.port = 636;
        assert_eq!(config.url(), "ldaps://localhost:636");
    }

    #[test]
    fn duplicate_attributes_rejected_case_insensitively() {
        let config = DirectoryConfig {
            attributes: vec!["mail".to_string(), "Mail".to_string()],
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn page_size_must_fit_the_paging_control() {
        assert!(DirectoryConfig { page_size: 0, ..valid() }.validate().is_err());
        assert!(DirectoryConfig { page_size: u32::MAX, ..valid() }.validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn debug_redacts_password() {
        let config = DirectoryConfig {
            bind_password: "hunter2".to_string(),
            ..valid()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
