//! Per-run error log files.

use crate::error::EngineError;
use chrono::{DateTime, SecondsFormat, Utc};
use ldapsync_artifact::{ensure_dir, timestamped_file_name_at, ArtifactResult, LOG_EXTENSION};
use ldapsync_types::RunId;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// An error log written for a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Writes `<timestamp>_<run id>.log` into `dir` describing `error`.
    ///
    /// An existing file is never replaced. The file holds the run id, the
    /// time, and the error followed by every cause in its chain. `dir` is
    /// created if missing.
    pub fn write(dir: &Path, run_id: RunId, error: &EngineError) -> ArtifactResult<Self> {
        Self::write_at(dir, Utc::now(), run_id, error)
    }

    fn write_at(
        dir: &Path,
        at: DateTime<Utc>,
        run_id: RunId,
        error: &EngineError,
    ) -> ArtifactResult<Self> {
        ensure_dir(dir)?;
        let path = dir.join(file_name(at, run_id));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(render(run_id, error).as_bytes())?;
        file.sync_all()?;
        info!(path = %path.display(), "Wrote error log");
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn file_name(at: DateTime<Utc>, run_id: RunId) -> String {
    timestamped_file_name_at(at, &format!("_{run_id}{LOG_EXTENSION}"))
}

fn render(run_id: RunId, error: &EngineError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run_id: {run_id}");
    let _ = writeln!(out, "time: {}", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

    let mut chain = error.chain().into_iter();
    if let Some(head) = chain.next() {
        let _ = writeln!(out, "error: {head}");
    }
    for cause in chain {
        let _ = writeln!(out, "  caused by: {cause}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapsync_directory::DirectoryError;

    #[test]
    fn render_lists_run_and_error() {
        let run_id = RunId::new();
        let error = EngineError::from(DirectoryError::Timeout);
        let text = render(run_id, &error);

        assert!(text.starts_with(&format!("run_id: {run_id}\n")));
        assert!(text.contains("\ntime: "));
        assert!(text.contains(&format!("error: {}", DirectoryError::Timeout)));
    }

    #[test]
    fn runs_failing_in_the_same_millisecond_keep_separate_logs() {
        let at = Utc::now();
        let (a, b) = (RunId::new(), RunId::new());
        assert_ne!(file_name(at, a), file_name(at, b));
        assert!(file_name(at, a).ends_with(&format!("_{a}.log")));
    }

    #[test]
    fn existing_log_is_never_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Utc::now();
        let run_id = RunId::new();
        let error = EngineError::from(DirectoryError::Timeout);

        let first = ErrorLog::write_at(tmp.path(), at, run_id, &error).unwrap();
        std::fs::write(first.path(), "kept").unwrap();

        assert!(ErrorLog::write_at(tmp.path(), at, run_id, &error).is_err());
        assert_eq!(std::fs::read_to_string(first.path()).unwrap(), "kept");
    }
}
