//! Canonical field descriptors and the field mapping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::table::cell_text;

/// A canonical schema field that extracted columns are mapped onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Stable key used in canonical records (e.g. `agent_name`).
    pub key: String,

    /// Display label.
    pub label: String,

    /// Whether the field must be mapped before a mapping can be applied.
    #[serde(default)]
    pub required: bool,
}

impl FieldDescriptor {
    /// Create an optional field.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            required: false,
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// A descriptor whose key and label are both the given header text.
    pub fn from_header(header: &str) -> Self {
        Self::new(header, header)
    }

    /// Read a field configuration list from loosely-shaped JSON.
    ///
    /// Entries may be plain strings or objects carrying `key`/`field`/`name`
    /// and `label`/`display_name`. Entries without a key are skipped.
    /// Returns `None` when the value is not an array.
    pub fn parse_list(value: &Value) -> Option<Vec<FieldDescriptor>> {
        let items = value.as_array()?;
        Some(items.iter().filter_map(Self::parse_one).collect())
    }

    fn parse_one(value: &Value) -> Option<FieldDescriptor> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self::from_header(s)),
            Value::Object(map) => {
                let key = ["key", "field", "name"]
                    .iter()
                    .find_map(|k| map.get(*k))
                    .map(cell_text)
                    .filter(|k| !k.trim().is_empty())?;
                let label = ["label", "display_name", "displayName"]
                    .iter()
                    .find_map(|k| map.get(*k))
                    .map(cell_text)
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| key.clone());
                let required = map.get("required").and_then(Value::as_bool).unwrap_or(false);
                Some(FieldDescriptor {
                    key,
                    label,
                    required,
                })
            }
            _ => None,
        }
    }
}

/// Ordered association from canonical field key to source column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(IndexMap<String, String>);

impl FieldMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a field to a source column, replacing any earlier choice.
    pub fn insert(&mut self, field: impl Into<String>, column: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), column.into())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.insert(field, column);
        self
    }

    /// Clear the mapping for a field.
    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.shift_remove(field)
    }

    /// Source column for a field.
    pub fn source_for(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Whether the field has a non-empty source column.
    pub fn is_mapped(&self, field: &str) -> bool {
        self.source_for(field).is_some()
    }

    /// Iterate over `(field, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field keys, in order, as optional descriptors.
    pub fn implied_fields(&self) -> Vec<FieldDescriptor> {
        self.0.keys().map(|k| FieldDescriptor::new(k, k)).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
