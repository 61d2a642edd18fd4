//! Raw directory entries as returned by a search.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single attribute value on a directory entry.
///
/// Directory servers hand back every value as text; `Integer` exists for
/// sources that already know an attribute is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Text(String),
    /// Multi-valued attribute. May be empty.
    Multi(Vec<String>),
}

impl AttributeValue {
    /// Builds a value from the raw value list of a search result.
    ///
    /// A single value collapses to `Text`; zero or several stay a list.
    #[must_use]
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            Self::Text(values.remove(0))
        } else {
            Self::Multi(values)
        }
    }

    /// Returns true for an empty multi-valued attribute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Multi(values) if values.is_empty())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// One raw result of a directory search.
///
/// Attributes keep insertion order. Lookups ignore ASCII case because
/// servers answer with their own spelling of attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryEntry {
    dn: String,
    attributes: IndexMap<String, AttributeValue>,
}

impl DirectoryEntry {
    /// Creates an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Adds an attribute, builder style.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets an attribute, replacing any value stored under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let value = value.into();
        match self.position_of(&name) {
            Some(index) => {
                if let Some((_, slot)) = self.attributes.get_index_mut(index) {
                    *slot = value;
                }
            }
            None => {
                self.attributes.insert(name, value);
            }
        }
    }

    /// Looks up an attribute by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value);
        }
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// The distinguished name of the entry.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// All attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, AttributeValue> {
        &self.attributes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.attributes
            .keys()
            .position(|key| key.eq_ignore_ascii_case(name))
    }
}
