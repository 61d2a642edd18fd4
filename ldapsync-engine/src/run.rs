//! One process invocation, from settings to exit status.

use crate::error::{EngineError, EngineResult};
use crate::error_log::ErrorLog;
use crate::runner::SyncRunner;
use crate::settings::Settings;
use crate::status::ExitStatus;
use ldapsync_delivery::{HttpDelivery, SftpTransfer};
use ldapsync_directory::{DirectoryClient, DirectoryError, DirectorySession, DirectoryStatus};
use ldapsync_types::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, info_span, warn, Instrument};

/// What a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// Write the artifact and upload it over SFTP.
    SyncFiles,
    /// Post record pages to the web back ends.
    SyncWeb,
    /// Check that the web back ends answer.
    Probe,
    /// Check that the directory accepts the bind and search base.
    CheckDirectory,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncFiles => f.write_str("sync-files"),
            Self::SyncWeb => f.write_str("sync-web"),
            Self::Probe => f.write_str("probe"),
            Self::CheckDirectory => f.write_str("check-directory"),
        }
    }
}

/// Runs `command` once and maps the outcome to an exit status.
///
/// Settings are validated first; a rejected configuration touches nothing.
/// Any later failure is logged once and written to an error log in the log
/// directory. The directory session is closed on every path.
pub async fn run(settings: &Settings, command: Command) -> ExitStatus {
    let run_id = RunId::new();
    let span = info_span!("run", run_id = %run_id, command = %command);

    async move {
        if let Err(e) = settings.validate_for(command) {
            error!(error = %e, "Invalid configuration");
            return ExitStatus::ConfigInvalid;
        }

        info!("Run started");
        match execute(settings, command).await {
            Ok(()) => {
                info!("Run finished");
                ExitStatus::Success
            }
            Err(e) => {
                error!(error = %e, "Run failed");
                if let Err(log_err) = ErrorLog::write(&settings.log_dir, run_id, &e) {
                    warn!(error = %log_err, "Could not write error log");
                }
                ExitStatus::PipelineFailed
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute(settings: &Settings, command: Command) -> EngineResult<()> {
    let runner = SyncRunner::new(settings);

    match command {
        Command::SyncFiles => {
            let transfer = SftpTransfer::new(settings.sftp.host_keys.clone(), settings.sftp.timeout());
            let mut session = open_session(settings).await?;
            let result = runner.sync_files(&mut session, &transfer).await;
            close_session(session).await;
            result?.into_result()?;
        }
        Command::SyncWeb => {
            let http = HttpDelivery::new(settings.web.credentials.clone(), &settings.web.http)?;
            let mut session = open_session(settings).await?;
            let result = runner.sync_web(&mut session, &http).await;
            close_session(session).await;
            result?.into_result()?;
        }
        Command::Probe => {
            let http = HttpDelivery::new(settings.web.credentials.clone(), &settings.web.http)?;
            runner.probe(&http).await.into_result()?;
        }
        Command::CheckDirectory => check_directory(settings).await?,
    }
    Ok(())
}

async fn open_session(settings: &Settings) -> EngineResult<DirectorySession> {
    info!(step = "connect directory", url = %settings.directory.url(), "Connect directory");
    let client = DirectoryClient::new(settings.directory.clone())?;
    Ok(client.open().await?)
}

async fn close_session(session: DirectorySession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Error closing directory session");
    }
}

async fn check_directory(settings: &Settings) -> EngineResult<()> {
    let config = &settings.directory;
    info!(step = "connect directory", url = %config.url(), "Check directory");
    let client = DirectoryClient::new(config.clone())?;

    let error = match client.status().await {
        DirectoryStatus::Connected => {
            info!(base = %config.search_base, "Directory reachable");
            return Ok(());
        }
        DirectoryStatus::Unreachable { reason } => DirectoryError::Unavailable {
            url: config.url(),
            reason,
        },
        DirectoryStatus::BindFailed { code, message } => DirectoryError::BindFailed {
            bind_dn: config.bind_dn.clone(),
            code,
            message,
        },
        DirectoryStatus::SearchFailed { reason } => DirectoryError::SearchFailed(reason),
    };
    Err(EngineError::Directory(error))
}
