//! The sync pipelines.
//!
//! Each pipeline takes its entry source and delivery client as arguments, so
//! the same code runs against a live directory session or an in-memory
//! stream, and against real or fake destinations.

use crate::error::{EngineError, EngineResult};
use crate::settings::Settings;
use ldapsync_artifact::{
    prepare_backup_dir, timestamped_file_name, Artifact, ArtifactShape, ArtifactWriter,
    ARTIFACT_EXTENSION,
};
use ldapsync_delivery::{
    deliver_file, DeliveryError, DeliveryReport, DestinationOutcome, FileTransfer, HttpDelivery,
    ProbeResult,
};
use ldapsync_directory::{format_entry, EntryStream, Pager};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Result of a file sync: the artifact and where it went.
#[derive(Debug, Clone)]
pub struct FilesSummary {
    pub artifact: Artifact,
    pub report: DeliveryReport,
}

impl FilesSummary {
    /// Fails if any SFTP destination was not delivered.
    pub fn into_result(self) -> EngineResult<Self> {
        let Self { artifact, report } = self;
        let report = report.into_result()?;
        Ok(Self { artifact, report })
    }
}

/// Per-destination totals across every page of a web sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSummary {
    pub target: String,
    pub pages_delivered: usize,
    pub pages_failed: usize,
    /// HTTP status of the most recent page; `None` if it got no answer.
    pub last_status: Option<u16>,
}

impl DestinationSummary {
    fn new(target: String) -> Self {
        Self {
            target,
            pages_delivered: 0,
            pages_failed: 0,
            last_status: None,
        }
    }

    fn record(&mut self, outcome: &DestinationOutcome) {
        if outcome.is_delivered() {
            self.pages_delivered += 1;
        } else {
            self.pages_failed += 1;
        }
        self.last_status = outcome.http_status;
    }
}

/// Result of a web sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSummary {
    pub pages: usize,
    pub records: usize,
    pub destinations: Vec<DestinationSummary>,
}

impl WebSummary {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.destinations.iter().all(|d| d.pages_failed == 0)
    }

    /// Fails if any destination missed at least one page.
    pub fn into_result(self) -> EngineResult<Self> {
        let failed = self.destinations.iter().filter(|d| d.pages_failed > 0).count();
        if failed > 0 {
            return Err(DeliveryError::Incomplete {
                failed,
                total: self.destinations.len(),
            }
            .into());
        }
        Ok(self)
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSummary {
    pub results: Vec<ProbeResult>,
}

impl ProbeSummary {
    #[must_use]
    pub fn reachable(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_reachable()).count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.reachable() == self.results.len()
    }

    /// Fails if any destination was unreachable.
    pub fn into_result(self) -> EngineResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(EngineError::Unreachable {
            unreachable: self.results.len() - self.reachable(),
            total: self.results.len(),
        })
    }
}

/// Runs the pipelines for one set of settings.
#[derive(Debug, Clone, Copy)]
pub struct SyncRunner<'a> {
    settings: &'a Settings,
}

impl<'a> SyncRunner<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Clears the backup directory, writes the artifact from `entries`, and
    /// uploads it to every SFTP destination under the configured policy.
    ///
    /// Delivery failures are reported in the summary, not as an error.
    pub async fn sync_files(
        &self,
        entries: &mut dyn EntryStream,
        transfer: &dyn FileTransfer,
    ) -> EngineResult<FilesSummary> {
        let backup_dir = &self.settings.backup_dir;
        let removed = prepare_backup_dir(backup_dir)?;
        debug!(path = %backup_dir.display(), removed, "Cleared backup directory");

        let path = backup_dir.join(timestamped_file_name(ARTIFACT_EXTENSION));
        info!(step = "query users", shape = %self.settings.shape, "Query users");
        let artifact = self.write_artifact(entries, path).await?;
        info!(
            step = "write artifact",
            path = %artifact.path.display(),
            records = artifact.records,
            bytes = artifact.bytes,
            "Wrote artifact"
        );

        let sftp = &self.settings.sftp;
        info!(
            step = "deliver",
            destinations = sftp.destinations.len(),
            policy = %sftp.policy,
            "Deliver artifact"
        );
        let report = deliver_file(transfer, &sftp.destinations, &artifact.path, sftp.policy).await;
        if !report.is_success() {
            warn!(
                delivered = report.delivered(),
                total = report.outcomes().len(),
                "Artifact not delivered everywhere"
            );
        }

        Ok(FilesSummary { artifact, report })
    }

    async fn write_artifact(&self, entries: &mut dyn EntryStream, path: PathBuf) -> EngineResult<Artifact> {
        let fields = &self.settings.directory.attributes;
        let mut writer = ArtifactWriter::create(path)?;

        while let Some(entry) = entries.next_entry().await? {
            match self.settings.shape {
                ArtifactShape::Formatted => writer.append(&format_entry(&entry, fields))?,
                ArtifactShape::Raw => writer.append(entry.attributes())?,
            }
        }

        Ok(writer.finish()?)
    }

    /// Pages `entries` and posts every page to every web destination.
    ///
    /// A destination failing a page never stops the others or later pages.
    pub async fn sync_web(
        &self,
        entries: &mut dyn EntryStream,
        http: &HttpDelivery,
    ) -> EngineResult<WebSummary> {
        let web = &self.settings.web;
        let directory = &self.settings.directory;
        let page_size = usize::try_from(directory.page_size).unwrap_or(usize::MAX);

        let mut destinations: Vec<DestinationSummary> = web
            .destinations
            .iter()
            .map(|d| DestinationSummary::new(d.to_string()))
            .collect();

        info!(step = "query users", mode = %self.settings.paging, page_size, "Query users");
        let mut pager = Pager::new(entries, &directory.attributes, page_size, self.settings.paging);

        while let Some(page) = pager.next_page().await? {
            info!(step = "deliver", page = pager.pages(), records = page.len(), "Deliver page");
            let report = http.deliver_page(&web.destinations, &page).await;
            for (summary, outcome) in destinations.iter_mut().zip(report.outcomes()) {
                summary.record(outcome);
            }
        }

        let summary = WebSummary {
            pages: pager.pages(),
            records: pager.records(),
            destinations,
        };

        for dest in &summary.destinations {
            info!(
                destination = %dest.target,
                pages_delivered = dest.pages_delivered,
                pages_failed = dest.pages_failed,
                last_status = dest.last_status,
                "Web sync summary"
            );
        }
        Ok(summary)
    }

    /// Checks every web destination. Touches neither the directory nor disk.
    pub async fn probe(&self, http: &HttpDelivery) -> ProbeSummary {
        let destinations = &self.settings.web.destinations;
        info!(step = "probe", destinations = destinations.len(), "Probe web destinations");
        ProbeSummary {
            results: http.probe_all(destinations).await,
        }
    }
}
