//! Formatted records: the flat shape sent to destinations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Separator used when a multi-valued attribute is flattened.
pub const MULTI_VALUE_DELIMITER: &str = "|";

/// A flat mapping from configured field names to optional string values.
///
/// Field order is the order fields were pushed, which the formatter keeps
/// equal to the configured attribute list. Serializes as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormattedRecord(IndexMap<String, Option<String>>);

impl FormattedRecord {
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Creates an empty record sized for `fields` entries.
    #[must_use]
    pub fn with_capacity(fields: usize) -> Self {
        Self(IndexMap::with_capacity(fields))
    }

    /// Appends a field. A repeated name overwrites the earlier value in place.
    pub fn push(&mut self, field: impl Into<String>, value: Option<String>) {
        self.0.insert(field.into(), value);
    }

    /// Returns the value of a field: `None` if the field is not present,
    /// `Some(None)` if it is present but null.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Option<&str>> {
        self.0.get(field).map(Option::as_deref)
    }

    /// Field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(field, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for FormattedRecord {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
