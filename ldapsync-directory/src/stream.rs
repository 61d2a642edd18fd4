//! The entry stream abstraction consumed by the orchestrator.

use crate::error::{DirectoryError, DirectoryResult};
use async_trait::async_trait;
use ldapsync_types::DirectoryEntry;
use std::collections::VecDeque;

/// A lazy, finite, non-restartable sequence of directory entries.
///
/// Once `next_entry` has returned `Ok(None)` every later call returns
/// `Ok(None)` as well.
#[async_trait]
pub trait EntryStream: Send {
    /// Returns the next entry, or `None` when the search is exhausted.
    async fn next_entry(&mut self) -> DirectoryResult<Option<DirectoryEntry>>;
}

/// Entries held in memory, for injecting a fixed result set.
#[derive(Debug, Default)]
pub struct MemoryEntries {
    entries: VecDeque<DirectoryEntry>,
    failure: Option<String>,
}

impl MemoryEntries {
    pub fn new(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            failure: None,
        }
    }

    /// Yields `entries`, then fails with a search error instead of ending.
    pub fn failing_after(entries: impl IntoIterator<Item = DirectoryEntry>, message: impl Into<String>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            failure: Some(message.into()),
        }
    }

    /// Entries not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl EntryStream for MemoryEntries {
    async fn next_entry(&mut self) -> DirectoryResult<Option<DirectoryEntry>> {
        if let Some(entry) = self.entries.pop_front() {
            return Ok(Some(entry));
        }
        match self.failure.take() {
            Some(message) => Err(DirectoryError::SearchFailed(message)),
            None => Ok(None),
        }
    }
}
