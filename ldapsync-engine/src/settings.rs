//! Run settings, built once at startup and passed by reference.

use crate::error::ConfigError;
use crate::run::Command;
use ldapsync_artifact::ArtifactShape;
use ldapsync_delivery::{
    DeliveryPolicy, HostKeyPolicy, HttpConfig, HttpCredentials, HttpDestination, SftpDestination,
};
use ldapsync_directory::{DirectoryConfig, PagingMode};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// SFTP fan-out settings.
#[derive(Debug, Clone)]
pub struct SftpSettings {
    pub destinations: Vec<SftpDestination>,
    pub host_keys: HostKeyPolicy,
    pub policy: DeliveryPolicy,
    /// Bounds the TCP connect and every session operation.
    pub timeout_secs: u64,
}

impl Default for SftpSettings {
    fn default() -> Self {
        Self {
            destinations: Vec::new(),
            host_keys: HostKeyPolicy::Disabled,
            policy: DeliveryPolicy::default(),
            timeout_secs: 30,
        }
    }
}

impl SftpSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Web back end settings, shared by sync-web and probe.
#[derive(Debug, Clone, Default)]
pub struct WebSettings {
    pub destinations: Vec<HttpDestination>,
    pub credentials: HttpCredentials,
    pub http: HttpConfig,
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub directory: DirectoryConfig,
    pub paging: PagingMode,
    pub shape: ArtifactShape,
    /// Cleared at the start of every file sync; holds the run's artifact.
    pub backup_dir: PathBuf,
    /// Receives one error log per failed run.
    pub log_dir: PathBuf,
    pub sftp: SftpSettings,
    pub web: WebSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: DirectoryConfig::default(),
            paging: PagingMode::default(),
            shape: ArtifactShape::default(),
            backup_dir: PathBuf::from("backup"),
            log_dir: PathBuf::from("logs"),
            sftp: SftpSettings::default(),
            web: WebSettings::default(),
        }
    }
}

impl Settings {
    /// Checks values every command relies on.
    ///
    /// The backup directory is emptied by every file sync, so it may not be
    /// the working directory or one of its parents, and the log directory
    /// may not lie inside it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(invalid("log directory", "must not be empty"));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(invalid("backup directory", "must not be empty"));
        }

        let backup_dir = normalize(&self.backup_dir)?;
        let log_dir = normalize(&self.log_dir)?;
        let cwd = normalize(Path::new("."))?;

        if cwd.starts_with(&backup_dir) {
            return Err(invalid(
                "backup directory",
                format!(
                    "{} contains the working directory, which would be cleared",
                    self.backup_dir.display()
                ),
            ));
        }
        if log_dir.starts_with(&backup_dir) {
            return Err(invalid(
                "log directory",
                format!(
                    "{} lies inside the backup directory {}, which is cleared on every file sync",
                    self.log_dir.display(),
                    self.backup_dir.display()
                ),
            ));
        }
        Ok(())
    }

    /// Checks everything `command` needs. Sections a command never touches
    /// are not checked, so probing works without directory settings.
    pub fn validate_for(&self, command: Command) -> Result<(), ConfigError> {
        self.validate()?;

        match command {
            Command::SyncFiles => {
                self.validate_directory()?;
                self.validate_sftp()
            }
            Command::SyncWeb => {
                self.validate_directory()?;
                self.validate_web()
            }
            Command::Probe => self.validate_web(),
            Command::CheckDirectory => self.validate_directory(),
        }
    }

    fn validate_directory(&self) -> Result<(), ConfigError> {
        self.directory
            .validate()
            .map_err(|e| ConfigError::Directory(e.to_string()))
    }

    fn validate_sftp(&self) -> Result<(), ConfigError> {
        if self.sftp.destinations.is_empty() {
            return Err(ConfigError::NoDestinations { kind: "SFTP" });
        }
        if self.sftp.timeout_secs == 0 {
            return Err(invalid("SFTP timeout", "must be at least one second"));
        }
        for dest in &self.sftp.destinations {
            if dest.username.is_empty() {
                return Err(invalid("SFTP user", "must not be empty"));
            }
            if dest.remote_dir.trim().is_empty() {
                return Err(invalid("SFTP target directory", "must not be empty"));
            }
        }
        Ok(())
    }

    fn validate_web(&self) -> Result<(), ConfigError> {
        if self.web.destinations.is_empty() {
            return Err(ConfigError::NoDestinations { kind: "web" });
        }
        if self.web.http.timeout_secs == 0 || self.web.http.connect_timeout_secs == 0 {
            return Err(invalid("HTTP timeout", "must be at least one second"));
        }
        for dest in &self.web.destinations {
            let url = dest.base_url();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid("web destination", format!("{url} is not an http(s) URL")));
            }
        }
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically. The path
/// need not exist yet.
fn normalize(path: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = std::path::absolute(path).map_err(|e| {
        invalid("directory", format!("cannot resolve {}: {e}", path.display()))
    })?;

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_settings() -> Settings {
        Settings {
            web: WebSettings {
                destinations: vec![HttpDestination::new("http://memo.local")],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn probe_does_not_need_directory_settings() {
        let settings = web_settings();
        assert!(settings.directory.search_base.is_empty());
        assert_eq!(settings.validate_for(Command::Probe), Ok(()));
        assert!(matches!(
            settings.validate_for(Command::SyncWeb),
            Err(ConfigError::Directory(_))
        ));
    }

    #[test]
    fn sync_files_needs_sftp_destinations() {
        let mut settings = web_settings();
        settings.directory.search_base = "dc=example,dc=com".to_string();
        assert_eq!(
            settings.validate_for(Command::SyncFiles),
            Err(ConfigError::NoDestinations { kind: "SFTP" })
        );
    }

    #[test]
    fn web_destination_must_be_http() {
        let mut settings = web_settings();
        settings.web.destinations = vec![HttpDestination::new("ftp://memo.local")];
        assert!(matches!(
            settings.validate_for(Command::Probe),
            Err(ConfigError::Invalid { field: "web destination", .. })
        ));
    }

    #[test]
    fn backup_and_log_dirs_must_differ() {
        let mut settings = web_settings();
        settings.log_dir = settings.backup_dir.clone();
        assert!(settings.validate().is_err());

        settings.backup_dir = PathBuf::from("./backup");
        settings.log_dir = PathBuf::from("backup");
        assert!(settings.validate().is_err());

        settings.log_dir = PathBuf::from("backup/../logs");
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn log_dir_inside_backup_dir_is_rejected() {
        let mut settings = web_settings();
        settings.backup_dir = PathBuf::from("out");
        settings.log_dir = PathBuf::from("out/logs");
        assert!(matches!(
            settings.validate_for(Command::Probe),
            Err(ConfigError::Invalid { field: "log directory", .. })
        ));

        settings.log_dir = PathBuf::from("./out/./logs");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn backup_dir_may_not_hold_the_working_directory() {
        let mut settings = web_settings();
        for dir in [".", "./", "..", "backup/.."] {
            settings.backup_dir = PathBuf::from(dir);
            assert!(
                matches!(
                    settings.validate(),
                    Err(ConfigError::Invalid { field: "backup directory", .. })
                ),
                "{dir} accepted"
            );
        }

        settings.backup_dir = PathBuf::from("");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn backup_dir_inside_log_dir_is_allowed() {
        let mut settings = web_settings();
        settings.log_dir = PathBuf::from("data");
        settings.backup_dir = PathBuf::from("data/backup");
        assert_eq!(settings.validate(), Ok(()));
    }
}
