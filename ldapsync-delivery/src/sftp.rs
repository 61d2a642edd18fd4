//! SFTP delivery of the artifact file.
//!
//! Each upload opens its own session: connect, handshake, host key check,
//! password auth, remote directory check, then write
//! `remote_dir/<artifact file name>`, replacing any file of that name.
//! libssh2 is blocking, so sessions run on the blocking thread pool.

use crate::error::{DeliveryError, DeliveryResult};
use crate::report::{DeliveryPolicy, DeliveryReport, DestinationOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};
use std::fmt;
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// `LIBSSH2_FX_NO_SUCH_FILE`
const FX_NO_SUCH_FILE: i32 = 2;
/// `LIBSSH2_FX_NO_SUCH_PATH`
const FX_NO_SUCH_PATH: i32 = 10;

/// One SFTP server and the directory artifacts go to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SftpDestination {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_dir: String,
}

impl SftpDestination {
    /// One destination per non-empty host, all sharing port, account and
    /// remote directory.
    pub fn from_hosts<I, S>(hosts: I, port: u16, username: &str, password: &str, remote_dir: &str) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty())
            .map(|host| Self {
                host,
                port,
                username: username.to_string(),
                password: password.to_string(),
                remote_dir: remote_dir.to_string(),
            })
            .collect()
    }

    /// `host:port`, used in logs and reports.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Remote path for a local file: `remote_dir/<file name>`.
    pub fn remote_path_for(&self, local: &Path) -> DeliveryResult<String> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DeliveryError::Config(format!("{} has no file name", local.display())))?;
        Ok(format!("{}/{name}", self.remote_dir.trim_end_matches('/')))
    }
}

impl fmt::Debug for SftpDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpDestination")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("remote_dir", &self.remote_dir)
            .finish()
    }
}

/// How server host keys are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key. Logged on every connection.
    Disabled,
    /// Require a matching entry in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
}

/// Uploads a local file to one destination.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Uploads `local` and returns the remote path written.
    ///
    /// Must fail with [`DeliveryError::RemoteDirectoryMissing`] before
    /// sending any data when the destination directory does not exist.
    async fn upload(&self, destination: &SftpDestination, local: &Path) -> DeliveryResult<String>;
}

/// [`FileTransfer`] over SFTP.
#[derive(Debug, Clone)]
pub struct SftpTransfer {
    host_keys: HostKeyPolicy,
    timeout: Duration,
}

impl SftpTransfer {
    /// `timeout` bounds the TCP connect and every session operation.
    pub fn new(host_keys: HostKeyPolicy, timeout: Duration) -> Self {
        Self { host_keys, timeout }
    }
}

#[async_trait]
impl FileTransfer for SftpTransfer {
    async fn upload(&self, destination: &SftpDestination, local: &Path) -> DeliveryResult<String> {
        let target = destination.target();
        let destination = destination.clone();
        let local = local.to_path_buf();
        let host_keys = self.host_keys.clone();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(in_current_span(move || {
            upload_blocking(&destination, &local, &host_keys, timeout)
        }))
        .await
        .map_err(|e| DeliveryError::Transfer {
            target,
            reason: format!("upload task failed: {e}"),
        })?
    }
}

/// Carries the caller's span onto the blocking thread running `f`.
fn in_current_span<R>(f: impl FnOnce() -> R) -> impl FnOnce() -> R {
    let span = tracing::Span::current();
    move || span.in_scope(f)
}

fn upload_blocking(
    destination: &SftpDestination,
    local: &Path,
    host_keys: &HostKeyPolicy,
    timeout: Duration,
) -> DeliveryResult<String> {
    let remote_path = destination.remote_path_for(local)?;
    let mut source = File::open(local)?;

    let connection = SftpConnection::open(destination, host_keys, timeout)?;
    connection.ensure_dir(&destination.remote_dir)?;
    let bytes = connection.put(&mut source, &remote_path)?;

    info!(
        destination = %connection.target,
        remote = %remote_path,
        bytes,
        "Copied file"
    );
    Ok(remote_path)
}

/// An authenticated SFTP session. Disconnects on drop.
struct SftpConnection {
    session: Session,
    sftp: Option<Sftp>,
    target: String,
}

impl SftpConnection {
    fn open(
        destination: &SftpDestination,
        host_keys: &HostKeyPolicy,
        timeout: Duration,
    ) -> DeliveryResult<Self> {
        let target = destination.target();
        let connect_err = |reason: String| DeliveryError::Connect {
            target: target.clone(),
            reason,
        };

        let addr = (destination.host.as_str(), destination.port)
            .to_socket_addrs()
            .map_err(|e| connect_err(e.to_string()))?
            .next()
            .ok_or_else(|| connect_err("host did not resolve".to_string()))?;

        debug!(destination = %target, "Connecting to SFTP server");
        let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| connect_err(e.to_string()))?;

        let mut session = Session::new().map_err(|e| connect_err(e.to_string()))?;
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| connect_err(e.to_string()))?;

        verify_host_key(&session, destination, host_keys)?;

        if session
            .userauth_password(&destination.username, &destination.password)
            .is_err()
            || !session.authenticated()
        {
            return Err(DeliveryError::Auth {
                target,
                user: destination.username.clone(),
            });
        }

        let sftp = session.sftp().map_err(|e| DeliveryError::Transfer {
            target: target.clone(),
            reason: format!("cannot start sftp subsystem: {e}"),
        })?;

        Ok(Self {
            session,
            sftp: Some(sftp),
            target,
        })
    }

    fn sftp(&self) -> DeliveryResult<&Sftp> {
        self.sftp.as_ref().ok_or_else(|| DeliveryError::Transfer {
            target: self.target.clone(),
            reason: "sftp channel closed".to_string(),
        })
    }

    /// Fails with `RemoteDirectoryMissing` unless `dir` is a directory.
    fn ensure_dir(&self, dir: &str) -> DeliveryResult<()> {
        let stat = self.sftp()?.stat(Path::new(dir)).map(|stat| stat.is_dir());
        check_remote_dir(&self.target, dir, stat)
    }

    /// Writes `source` to `remote`, truncating an existing file.
    fn put(&self, source: &mut File, remote: &str) -> DeliveryResult<u64> {
        let transfer_err = |reason: String| DeliveryError::Transfer {
            target: self.target.clone(),
            reason,
        };

        let mut remote_file = self
            .sftp()?
            .create(Path::new(remote))
            .map_err(|e| transfer_err(format!("cannot create {remote}: {e}")))?;
        let bytes = io::copy(source, &mut remote_file).map_err(|e| transfer_err(e.to_string()))?;
        remote_file
            .close()
            .map_err(|e| transfer_err(format!("cannot close {remote}: {e}")))?;
        Ok(bytes)
    }
}

/// Maps the outcome of a `stat` on the remote directory. `Ok(is_dir)`.
fn check_remote_dir(target: &str, dir: &str, stat: Result<bool, ssh2::Error>) -> DeliveryResult<()> {
    let missing = || DeliveryError::RemoteDirectoryMissing {
        target: target.to_string(),
        path: dir.to_string(),
    };

    match stat {
        Ok(true) => Ok(()),
        Ok(false) => Err(missing()),
        Err(e) if matches!(e.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE | FX_NO_SUCH_PATH)) => Err(missing()),
        Err(e) => Err(DeliveryError::Transfer {
            target: target.to_string(),
            reason: format!("cannot stat {dir}: {e}"),
        }),
    }
}

impl Drop for SftpConnection {
    fn drop(&mut self) {
        drop(self.sftp.take());
        if let Err(e) = self.session.disconnect(None, "ldapsync done", None) {
            debug!(destination = %self.target, error = %e, "SFTP disconnect failed");
        }
    }
}

fn verify_host_key(
    session: &Session,
    destination: &SftpDestination,
    policy: &HostKeyPolicy,
) -> DeliveryResult<()> {
    let target = destination.target();
    let rejected = |reason: String| DeliveryError::HostKeyRejected {
        target: target.clone(),
        reason,
    };

    match policy {
        HostKeyPolicy::Disabled => {
            warn!(destination = %target, "Host key verification disabled; accepting server key");
            Ok(())
        }
        HostKeyPolicy::KnownHosts(path) => {
            let mut known = session.known_hosts().map_err(|e| rejected(e.to_string()))?;
            known
                .read_file(path, KnownHostFileKind::OpenSSH)
                .map_err(|e| rejected(format!("cannot read {}: {e}", path.display())))?;
            let (key, _) = session
                .host_key()
                .ok_or_else(|| rejected("server sent no host key".to_string()))?;

            match known.check_port(&destination.host, destination.port, key) {
                CheckResult::Match => Ok(()),
                CheckResult::NotFound => Err(rejected("host not in known_hosts".to_string())),
                CheckResult::Mismatch => Err(rejected("host key mismatch".to_string())),
                CheckResult::Failure => Err(rejected("host key check failed".to_string())),
            }
        }
    }
}

/// Uploads `local` to each destination in order.
///
/// Under [`DeliveryPolicy::FailFast`] the first failure stops the run and
/// the rest are reported as skipped.
pub async fn deliver_file(
    transfer: &dyn FileTransfer,
    destinations: &[SftpDestination],
    local: &Path,
    policy: DeliveryPolicy,
) -> DeliveryReport {
    let mut report = DeliveryReport::new();
    let mut halted = false;

    for destination in destinations {
        let target = destination.target();
        if halted {
            debug!(destination = %target, "Skipping after earlier failure");
            report.push(DestinationOutcome::skipped(target));
            continue;
        }

        info!(destination = %target, "Copy file");
        match transfer.upload(destination, local).await {
            Ok(remote) => {
                info!(destination = %target, remote = %remote, outcome = "delivered", "Upload finished");
                report.push(DestinationOutcome::delivered(target, None));
            }
            Err(e) => {
                warn!(destination = %target, error = %e, outcome = "failed", "Upload failed");
                report.push(DestinationOutcome::failed(target, &e));
                halted = policy == DeliveryPolicy::FailFast;
            }
        }
    }

    report
}
