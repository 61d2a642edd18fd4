//! Incremental JSON array writer.

use crate::error::ArtifactResult;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Indentation used for every record.
pub const INDENT: &[u8] = b"    ";

const PARTIAL_SUFFIX: &str = ".partial";

/// What each array element holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactShape {
    /// Flattened records with exactly the configured fields.
    #[default]
    Formatted,
    /// The raw attribute map of each directory entry.
    Raw,
}

impl fmt::Display for ArtifactShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Formatted => f.write_str("formatted"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

impl FromStr for ArtifactShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formatted" => Ok(Self::Formatted),
            "raw" => Ok(Self::Raw),
            other => Err(format!("unknown artifact shape: {other}")),
        }
    }
}

/// A finished artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub records: usize,
    pub bytes: u64,
}

impl Artifact {
    /// The file name used as the remote name on upload.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Writes a JSON array one element at a time.
///
/// Content goes to `<path>.partial` and is renamed to `path` by
/// [`finish`](Self::finish). Dropping an unfinished writer deletes the
/// partial file.
pub struct ArtifactWriter {
    path: PathBuf,
    partial: PathBuf,
    out: Option<BufWriter<File>>,
    scratch: Vec<u8>,
    records: usize,
    finished: bool,
}

impl ArtifactWriter {
    /// Creates the parent directory if needed and opens the array.
    pub fn create(path: impl Into<PathBuf>) -> ArtifactResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(&path);
        let mut out = BufWriter::new(File::create(&partial)?);
        out.write_all(b"[")?;
        debug!(path = %path.display(), "Opened artifact");

        Ok(Self {
            path,
            partial,
            out: Some(out),
            scratch: Vec::new(),
            records: 0,
            finished: false,
        })
    }

    /// Appends one record.
    ///
    /// The record is serialized in full before anything is written, so a
    /// serialization error leaves the array intact.
    pub fn append<T: Serialize + ?Sized>(&mut self, record: &T) -> ArtifactResult<()> {
        let separator: &[u8] = if self.records == 0 { b"\n" } else { b",\n" };
        self.scratch.clear();
        self.scratch.extend_from_slice(separator);
        let mut ser =
            serde_json::Serializer::with_formatter(&mut self.scratch, PrettyFormatter::with_indent(INDENT));
        record.serialize(&mut ser)?;

        if let Some(out) = self.out.as_mut() {
            out.write_all(&self.scratch)?;
        }
        self.records += 1;
        Ok(())
    }

    /// Records appended so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Closes the array, syncs it, and moves it to its final name.
    pub fn finish(mut self) -> ArtifactResult<Artifact> {
        let Some(mut out) = self.out.take() else {
            return Err(std::io::Error::other("artifact writer already closed").into());
        };
        out.write_all(b"\n]\n")?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.partial, &self.path)?;
        self.finished = true;
        let bytes = fs::metadata(&self.path)?.len();
        debug!(path = %self.path.display(), records = self.records, bytes, "Closed artifact");

        Ok(Artifact {
            path: self.path.clone(),
            records: self.records,
            bytes,
        })
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.out.take());
        if self.partial.exists() {
            if let Err(e) = fs::remove_file(&self.partial) {
                warn!(path = %self.partial.display(), error = %e, "Failed to remove partial artifact");
            }
        }
    }
}

/// Writes every record of `records` to a new artifact at `path`.
pub fn write_artifact<I, T>(path: impl Into<PathBuf>, records: I) -> ArtifactResult<Artifact>
where
    I: IntoIterator<Item = T>,
    T: Serialize,
{
    let mut writer = ArtifactWriter::create(path)?;
    for record in records {
        writer.append(&record)?;
    }
    writer.finish()
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
