//! Command line for ldapsync.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it; `.env` in the working directory is read first.

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use ldapsync_artifact::ArtifactShape;
use ldapsync_delivery::{
    DeliveryPolicy, HostKeyPolicy, HttpConfig, HttpCredentials, HttpDestination, SftpDestination,
};
use ldapsync_directory::{DirectoryConfig, PagingMode, DEFAULT_ATTRIBUTES};
use ldapsync_engine::{Command, Settings, SftpSettings, WebSettings};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const LDAP_PORT: u16 = 389;
const LDAPS_PORT: u16 = 636;

#[derive(Parser)]
#[command(name = "ldapsync")]
#[command(about = "Sync directory users to SFTP servers and web back ends")]
pub struct Args {
    #[command(subcommand)]
    pub command: CliCommand,

    #[command(flatten)]
    pub directory: DirectoryArgs,

    #[command(flatten)]
    pub sftp: SftpArgs,

    #[command(flatten)]
    pub web: WebArgs,

    /// Directory cleared before each file sync; holds the artifact
    #[arg(long, env = "SYNC_BACKUP_DIR", default_value = "backup")]
    pub backup_dir: PathBuf,

    /// Directory receiving error logs of failed runs
    #[arg(long, env = "SYNC_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    /// Write the user artifact and upload it to every SFTP server
    SyncFiles,
    /// Post users page by page to every web back end
    SyncWeb,
    /// Check that every web back end answers
    Probe,
    /// Check the directory connection, bind and search base
    CheckDirectory,
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::SyncFiles => Command::SyncFiles,
            CliCommand::SyncWeb => Command::SyncWeb,
            CliCommand::Probe => Command::Probe,
            CliCommand::CheckDirectory => Command::CheckDirectory,
        }
    }
}

#[derive(clap::Args)]
pub struct DirectoryArgs {
    #[arg(long, env = "LDAP_HOST", default_value = "localhost")]
    pub ldap_host: String,

    /// Defaults to 389, or 636 with TLS
    #[arg(long, env = "LDAP_PORT")]
    pub ldap_port: Option<u16>,

    /// Connect with ldaps://
    #[arg(long, env = "LDAP_USE_TLS", value_parser = BoolishValueParser::new())]
    pub ldap_use_tls: bool,

    /// Bind DN
    #[arg(long, env = "LDAP_USER", default_value = "")]
    pub ldap_user: String,

    #[arg(long, env = "LDAP_PASSWORD", default_value = "", hide_env_values = true)]
    pub ldap_password: String,

    /// Search base DN
    #[arg(long, env = "LDAP_BASE", default_value = "")]
    pub ldap_base: String,

    #[arg(long, env = "LDAP_SEARCH_FILTER", default_value = "(objectClass=person)")]
    pub ldap_search_filter: String,

    /// Comma-separated attributes, in output order
    #[arg(long, env = "LDAP_ATTRIBUTES", value_delimiter = ',')]
    pub ldap_attributes: Vec<String>,

    /// Entries per search page and per web delivery page
    #[arg(long, env = "LDAP_PAGE_SIZE", default_value_t = ldapsync_directory::DEFAULT_PAGE_SIZE)]
    pub ldap_page_size: u32,

    /// Seconds allowed for connecting and for each directory operation
    #[arg(long, env = "LDAP_TIMEOUT", default_value_t = 30)]
    pub ldap_timeout: u64,

    /// streaming or buffered
    #[arg(long, env = "SYNC_PAGING", default_value = "streaming")]
    pub paging: PagingMode,

    /// formatted or raw
    #[arg(long, env = "SYNC_ARTIFACT_SHAPE", default_value = "formatted")]
    pub artifact_shape: ArtifactShape,
}

#[derive(clap::Args)]
pub struct SftpArgs {
    #[arg(long, env = "SFTP_PROD_IP")]
    pub sftp_prod_ip: Option<String>,

    #[arg(long, env = "SFTP_DEV_IP")]
    pub sftp_dev_ip: Option<String>,

    #[arg(long, env = "SFTP_PORT", default_value_t = 22)]
    pub sftp_port: u16,

    #[arg(long, env = "SFTP_USER", default_value = "")]
    pub sftp_user: String,

    #[arg(long, env = "SFTP_PASSWORD", default_value = "", hide_env_values = true)]
    pub sftp_password: String,

    /// Existing remote directory the artifact is written into
    #[arg(long, env = "SFTP_TARGET_DIR", default_value = "")]
    pub sftp_target_dir: String,

    /// OpenSSH known_hosts file; host keys are not verified without one
    #[arg(long, env = "SFTP_KNOWN_HOSTS")]
    pub sftp_known_hosts: Option<PathBuf>,

    /// best-effort or fail-fast
    #[arg(long, env = "SFTP_DELIVERY_POLICY", default_value = "best-effort")]
    pub sftp_policy: DeliveryPolicy,

    #[arg(long, env = "SFTP_TIMEOUT", default_value_t = 30)]
    pub sftp_timeout: u64,
}

#[derive(clap::Args)]
pub struct WebArgs {
    #[arg(long, env = "MEMO_WEB_PROD")]
    pub memo_web_prod: Option<String>,

    #[arg(long, env = "MEMO_WEB_DEV")]
    pub memo_web_dev: Option<String>,

    #[arg(long, env = "MEMO_AUTH_USER", default_value = "")]
    pub memo_auth_user: String,

    #[arg(long, env = "MEMO_AUTH_PASS", default_value = "", hide_env_values = true)]
    pub memo_auth_pass: String,

    #[arg(long, env = "HTTP_TIMEOUT", default_value_t = 60)]
    pub http_timeout: u64,

    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value_t = 10)]
    pub http_connect_timeout: u64,
}

impl Args {
    /// Builds run settings. Destinations with empty values are dropped.
    pub fn into_settings(self) -> Result<Settings> {
        let Self {
            directory,
            sftp,
            web,
            backup_dir,
            log_dir,
            ..
        } = self;

        let host_keys = match sftp.sftp_known_hosts {
            Some(path) if !path.as_os_str().is_empty() => {
                if !path.is_file() {
                    bail!("known_hosts file {} does not exist", path.display());
                }
                HostKeyPolicy::KnownHosts(path)
            }
            _ => HostKeyPolicy::Disabled,
        };

        let attributes = if directory.ldap_attributes.is_empty() {
            DEFAULT_ATTRIBUTES.iter().map(|a| a.to_string()).collect()
        } else {
            directory
                .ldap_attributes
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect()
        };

        let default_port = if directory.ldap_use_tls { LDAPS_PORT } else { LDAP_PORT };

        let sftp_hosts = [sftp.sftp_prod_ip, sftp.sftp_dev_ip];
        let web_urls = [web.memo_web_prod, web.memo_web_dev];

        Ok(Settings {
            directory: DirectoryConfig {
                host: directory.ldap_host,
                port: directory.ldap_port.unwrap_or(default_port),
                use_tls: directory.ldap_use_tls,
                bind_dn: directory.ldap_user,
                bind_password: directory.ldap_password,
                search_base: directory.ldap_base,
                search_filter: directory.ldap_search_filter,
                attributes,
                page_size: directory.ldap_page_size,
                timeout_secs: directory.ldap_timeout,
            },
            paging: directory.paging,
            shape: directory.artifact_shape,
            backup_dir,
            log_dir,
            sftp: SftpSettings {
                destinations: SftpDestination::from_hosts(
                    sftp_hosts.iter().flatten(),
                    sftp.sftp_port,
                    &sftp.sftp_user,
                    &sftp.sftp_password,
                    &sftp.sftp_target_dir,
                ),
                host_keys,
                policy: sftp.sftp_policy,
                timeout_secs: sftp.sftp_timeout,
            },
            web: WebSettings {
                destinations: HttpDestination::from_values(web_urls.iter().flatten()),
                credentials: HttpCredentials {
                    username: web.memo_auth_user,
                    password: web.memo_auth_pass,
                },
                http: HttpConfig {
                    timeout_secs: web.http_timeout,
                    connect_timeout_secs: web.http_connect_timeout,
                },
            },
        })
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the level.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")
}
