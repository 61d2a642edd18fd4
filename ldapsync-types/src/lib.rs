//! Core type definitions for ldapsync.
//!
//! This crate defines the data model shared by every stage of a sync run:
//! - Raw directory entries and their attribute values
//! - Formatted records, the flat shape delivered to destinations
//! - Run identifiers (UUID v7)

mod entry;
mod ids;
mod record;

pub use entry::{AttributeValue, DirectoryEntry};
pub use ids::RunId;
pub use record::{FormattedRecord, MULTI_VALUE_DELIMITER};
