//! Directory access for ldapsync.
//!
//! Provides the pieces that turn a directory search into delivery-ready
//! records:
//!
//! - **Client**: connects, binds and runs a paged subtree search over LDAP
//! - **Stream**: [`EntryStream`], the lazy sequence of entries a search yields
//! - **Format**: flattens raw entries into [`FormattedRecord`]s
//! - **Pager**: groups formatted records into delivery pages
//!
//! Connectivity problems surface as [`DirectoryError`] values; a failed bind
//! is never mistaken for an empty result set.
//!
//! [`FormattedRecord`]: ldapsync_types::FormattedRecord

mod client;
mod config;
mod error;
pub mod format;
mod pager;
mod stream;

pub use client::{DirectoryClient, DirectorySession, DirectoryStatus};
pub use config::{DirectoryConfig, DEFAULT_ATTRIBUTES, DEFAULT_PAGE_SIZE};
pub use error::{DirectoryError, DirectoryResult};
pub use format::{format_entry, format_value};
pub use pager::{Pager, PagingMode};
pub use stream::{EntryStream, MemoryEntries};
