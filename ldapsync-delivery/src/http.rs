//! HTTP delivery to web back ends.
//!
//! Records are posted as a JSON array with basic authentication. Success is
//! judged by status code alone: 200 means delivered, anything else is a
//! failure for that destination only.

use crate::error::{DeliveryError, DeliveryResult};
use crate::report::{DeliveryReport, DestinationOutcome};
use ldapsync_types::FormattedRecord;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Endpoint receiving user data.
pub const SYNC_PATH: &str = "/api/sync-ldap-user-data/";

/// Endpoint answering connectivity probes.
pub const PROBE_PATH: &str = "/api/sync-ldap-test-api/";

/// Basic-auth credentials shared by all web destinations.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for HttpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One web back end, identified by its base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpDestination {
    base_url: String,
}

impl HttpDestination {
    /// Trailing slashes are dropped so paths join cleanly.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// Builds destinations from configured values, skipping empty ones.
    pub fn from_values<I, S>(values: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .filter(|v| !v.as_ref().trim().is_empty())
            .map(|v| Self::new(v.as_ref()))
            .collect()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an API path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl fmt::Display for HttpDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)
    }
}

/// Timeouts for every web request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// Reachability of one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Answered 200.
    Reachable,
    /// Answered with another status.
    Unreachable { status: u16 },
    /// No HTTP answer at all.
    Failed { reason: String },
}

impl ProbeOutcome {
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// Probe outcome paired with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub destination: HttpDestination,
    pub outcome: ProbeOutcome,
}

/// Client posting to web back ends.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: Client,
    credentials: HttpCredentials,
}

impl HttpDelivery {
    /// Creates a client with the configured timeouts.
    pub fn new(credentials: HttpCredentials, config: &HttpConfig) -> DeliveryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self { client, credentials })
    }

    /// Posts one page of records. Returns the status on 200.
    pub async fn post_records(
        &self,
        destination: &HttpDestination,
        records: &[FormattedRecord],
    ) -> DeliveryResult<u16> {
        let url = destination.endpoint(SYNC_PATH);
        debug!(url = %url, records = records.len(), "Posting user data");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(records)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Status {
                target: destination.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }

    /// Posts a page to every destination. A failure never stops the others.
    pub async fn deliver_page(
        &self,
        destinations: &[HttpDestination],
        records: &[FormattedRecord],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::new();

        for destination in destinations {
            match self.post_records(destination, records).await {
                Ok(status) => {
                    info!(
                        destination = %destination,
                        status,
                        records = records.len(),
                        outcome = "delivered",
                        "Sent user data"
                    );
                    report.push(DestinationOutcome::delivered(destination.to_string(), Some(status)));
                }
                Err(e) => {
                    warn!(
                        destination = %destination,
                        status = e.http_status(),
                        error = %e,
                        outcome = "failed",
                        "Sending user data failed"
                    );
                    report.push(DestinationOutcome::failed(destination.to_string(), &e));
                }
            }
        }

        report
    }

    /// Posts a trivial form to the probe endpoint.
    pub async fn probe(&self, destination: &HttpDestination) -> ProbeOutcome {
        let url = destination.endpoint(PROBE_PATH);
        debug!(url = %url, "Probing web destination");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .form(&[("hello", "world")])
            .send()
            .await;

        match response {
            Ok(r) if r.status() == StatusCode::OK => ProbeOutcome::Reachable,
            Ok(r) => ProbeOutcome::Unreachable {
                status: r.status().as_u16(),
            },
            Err(e) => ProbeOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Probes every destination in order.
    pub async fn probe_all(&self, destinations: &[HttpDestination]) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let outcome = self.probe(destination).await;
            match &outcome {
                ProbeOutcome::Reachable => info!(destination = %destination, "Can connect"),
                ProbeOutcome::Unreachable { status } => {
                    warn!(destination = %destination, status, "Fail connect")
                }
                ProbeOutcome::Failed { reason } => {
                    warn!(destination = %destination, error = %reason, "Fail connect")
                }
            }
            results.push(ProbeResult {
                destination: destination.clone(),
                outcome,
            });
        }
        results
    }
}
