//! Grouping formatted records into delivery pages.

use crate::error::DirectoryResult;
use crate::format::format_entry;
use crate::stream::EntryStream;
use ldapsync_types::FormattedRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How search results are handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingMode {
    /// One page per `page_size` entries, plus a final partial page.
    #[default]
    Streaming,
    /// The whole result set as a single page.
    Buffered,
}

impl fmt::Display for PagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming => f.write_str("streaming"),
            Self::Buffered => f.write_str("buffered"),
        }
    }
}

impl FromStr for PagingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" => Ok(Self::Streaming),
            "buffered" => Ok(Self::Buffered),
            other => Err(format!("unknown paging mode: {other}")),
        }
    }
}

/// Reads an [`EntryStream`] and yields pages of formatted records.
pub struct Pager<'a, S: EntryStream + ?Sized> {
    source: &'a mut S,
    fields: &'a [String],
    page_size: usize,
    mode: PagingMode,
    exhausted: bool,
    pages: usize,
    records: usize,
}

impl<'a, S: EntryStream + ?Sized> Pager<'a, S> {
    /// A `page_size` of zero is treated as one.
    pub fn new(source: &'a mut S, fields: &'a [String], page_size: usize, mode: PagingMode) -> Self {
        Self {
            source,
            fields,
            page_size: page_size.max(1),
            mode,
            exhausted: false,
            pages: 0,
            records: 0,
        }
    }

    /// Returns the next page, or `None` once the source is exhausted.
    ///
    /// Streaming mode never yields an empty page. Buffered mode always
    /// yields exactly one page, which may be empty.
    pub async fn next_page(&mut self) -> DirectoryResult<Option<Vec<FormattedRecord>>> {
        if self.exhausted {
            return Ok(None);
        }

        let limit = match self.mode {
            PagingMode::Streaming => self.page_size,
            PagingMode::Buffered => usize::MAX,
        };

        let mut page = Vec::with_capacity(self.page_size);
        while page.len() < limit {
            match self.source.next_entry().await? {
                Some(entry) => page.push(format_entry(&entry, self.fields)),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if page.is_empty() && (self.mode == PagingMode::Streaming || self.pages > 0) {
            return Ok(None);
        }

        self.pages += 1;
        self.records += page.len();
        Ok(Some(page))
    }

    /// Pages yielded so far.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Records yielded so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }
}
