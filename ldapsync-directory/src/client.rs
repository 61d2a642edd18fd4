//! LDAP client: connect, bind and stream a paged search.

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::stream::EntryStream;
use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchStream};
use ldapsync_types::{AttributeValue, DirectoryEntry};
use tracing::{debug, info, warn};

/// Result code the server returns for bad credentials.
const INVALID_CREDENTIALS: u32 = 49;

type PagedSearch = SearchStream<'static, String, Vec<String>>;

/// Outcome of a connectivity check against the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryStatus {
    /// Connected, bound, and the search base is readable.
    Connected,
    /// The server could not be reached.
    Unreachable { reason: String },
    /// The server rejected the bind.
    BindFailed { code: u32, message: String },
    /// Bound, but the search base could not be read.
    SearchFailed { reason: String },
}

impl DirectoryStatus {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Client for one directory server.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    config: DirectoryConfig,
}

impl DirectoryClient {
    /// Creates a client after validating the configuration.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Connects, binds and starts the paged search.
    ///
    /// The returned session must be closed with [`DirectorySession::close`].
    pub async fn open(&self) -> DirectoryResult<DirectorySession> {
        let mut ldap = self.connect().await?;

        let adapters: Vec<Box<dyn Adapter<'static, String, Vec<String>>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(self.page_size()?)),
        ];

        debug!(
            base = %self.config.search_base,
            filter = %self.config.search_filter,
            page_size = self.config.page_size,
            "Starting paged search"
        );

        let search = ldap
            .with_timeout(self.config.timeout())
            .streaming_search_with(
                adapters,
                &self.config.search_base,
                Scope::Subtree,
                &self.config.search_filter,
                self.config.attributes.clone(),
            )
            .await;

        match search {
            Ok(search) => Ok(DirectorySession {
                ldap,
                url: self.config.url(),
                search: Some(search),
                attributes: self.config.attributes.clone(),
                received: 0,
                closed: false,
            }),
            Err(e) => {
                if let Err(unbind) = ldap.unbind().await {
                    warn!(error = %unbind, "Error during directory unbind");
                }
                Err(DirectoryError::search(e))
            }
        }
    }

    /// Checks that the server is reachable, accepts the bind, and can read
    /// the search base. Never streams results.
    pub async fn status(&self) -> DirectoryStatus {
        let mut ldap = match self.connect().await {
            Ok(ldap) => ldap,
            Err(DirectoryError::BindFailed { code, message, .. }) => {
                return DirectoryStatus::BindFailed { code, message };
            }
            Err(e) => {
                return DirectoryStatus::Unreachable {
                    reason: e.to_string(),
                };
            }
        };

        let probe = ldap
            .with_timeout(self.config.timeout())
            .search(&self.config.search_base, Scope::Base, "(objectClass=*)", vec!["1.1"])
            .await
            .and_then(|result| result.success());

        let status = match probe {
            Ok(_) => DirectoryStatus::Connected,
            Err(e) => DirectoryStatus::SearchFailed {
                reason: e.to_string(),
            },
        };

        if let Err(e) = ldap.unbind().await {
            warn!(error = %e, "Error during directory unbind");
        }
        status
    }

    fn page_size(&self) -> DirectoryResult<i32> {
        i32::try_from(self.config.page_size)
            .map_err(|_| DirectoryError::Config(format!("page size {} is out of range", self.config.page_size)))
    }

    /// Opens a connection and performs the simple bind.
    async fn connect(&self) -> DirectoryResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to directory server");

        let settings = LdapConnSettings::new().set_conn_timeout(self.config.timeout());
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| DirectoryError::unavailable(&url, e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "Directory connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        debug!(bind_dn = %bind_dn, "Performing directory bind");

        let result = ldap
            .with_timeout(self.config.timeout())
            .simple_bind(bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| DirectoryError::unavailable(&url, e))?;

        if result.rc != 0 {
            if let Err(e) = ldap.unbind().await {
                debug!(error = %e, "Unbind after failed bind");
            }
            let message = if result.rc == INVALID_CREDENTIALS {
                "invalid credentials".to_string()
            } else {
                result.text
            };
            return Err(DirectoryError::BindFailed {
                bind_dn: bind_dn.clone(),
                code: result.rc,
                message,
            });
        }

        info!(url = %url, "Connected to directory server");
        Ok(ldap)
    }
}

/// A bound connection with a paged search in progress.
///
/// Yields entries through [`EntryStream`]. Call [`close`](Self::close) on
/// every path once done; a session dropped unclosed logs a warning and loses
/// the connection with its handle.
pub struct DirectorySession {
    ldap: Ldap,
    url: String,
    search: Option<PagedSearch>,
    attributes: Vec<String>,
    received: usize,
    closed: bool,
}

impl DirectorySession {
    /// Entries yielded so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Abandons any unfinished search and unbinds.
    pub async fn close(mut self) -> DirectoryResult<()> {
        self.closed = true;
        self.search = None;
        debug!(received = self.received, "Closing directory session");
        self.ldap
            .unbind()
            .await
            .map_err(|e| DirectoryError::unbind(&self.url, e))
    }

    /// Keeps only the configured attributes, in configured order.
    fn to_entry(&self, raw: SearchEntry) -> DirectoryEntry {
        let SearchEntry {
            dn,
            mut attrs,
            mut bin_attrs,
        } = raw;
        let mut entry = DirectoryEntry::new(dn);

        for name in &self.attributes {
            let text_key = attrs.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned();
            if let Some(values) = text_key.and_then(|k| attrs.remove(&k)) {
                entry.insert(name.clone(), AttributeValue::from_values(values));
                continue;
            }

            let bin_key = bin_attrs.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned();
            if let Some(values) = bin_key.and_then(|k| bin_attrs.remove(&k)) {
                let values = values.iter().map(hex::encode).collect();
                entry.insert(name.clone(), AttributeValue::from_values(values));
            }
        }
        entry
    }
}

#[async_trait]
impl EntryStream for DirectorySession {
    async fn next_entry(&mut self) -> DirectoryResult<Option<DirectoryEntry>> {
        let Some(search) = self.search.as_mut() else {
            return Ok(None);
        };

        match search.next().await {
            Ok(Some(raw)) => {
                self.received += 1;
                Ok(Some(self.to_entry(SearchEntry::construct(raw))))
            }
            Ok(None) => {
                let outcome = search.finish().await;
                self.search = None;
                outcome.success().map_err(DirectoryError::search)?;
                info!(entries = self.received, "Directory search completed");
                Ok(None)
            }
            Err(e) => {
                self.search = None;
                Err(DirectoryError::search(e))
            }
        }
    }
}

impl Drop for DirectorySession {
    fn drop(&mut self) {
        if !self.closed {
            warn!(received = self.received, "Directory session dropped without close");
        }
    }
}

impl std::fmt::Debug for DirectorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySession")
            .field("url", &self.url)
            .field("attributes", &self.attributes)
            .field("received", &self.received)
            .field("searching", &self.search.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}
