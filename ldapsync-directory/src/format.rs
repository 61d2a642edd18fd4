//! Flattening raw entries into formatted records.
//!
//! Value rules:
//! - integer → decimal string
//! - empty list → null
//! - non-empty list → values joined with `|`, in directory order
//! - string → unchanged
//! - attribute missing from the entry → null

use ldapsync_types::{AttributeValue, DirectoryEntry, FormattedRecord, MULTI_VALUE_DELIMITER};

/// Formats a single attribute value.
#[must_use]
pub fn format_value(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Integer(n) => Some(n.to_string()),
        AttributeValue::Text(text) => Some(text.clone()),
        AttributeValue::Multi(values) if values.is_empty() => None,
        AttributeValue::Multi(values) => Some(values.join(MULTI_VALUE_DELIMITER)),
    }
}

/// Builds a record with exactly one field per name in `fields`, in order.
#[must_use]
pub fn format_entry(entry: &DirectoryEntry, fields: &[String]) -> FormattedRecord {
    let mut record = FormattedRecord::with_capacity(fields.len());
    for field in fields {
        record.push(field.clone(), entry.get(field).and_then(format_value));
    }
    record
}
