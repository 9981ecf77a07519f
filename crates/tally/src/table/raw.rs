//! Ingestion of extraction output into canonical tables.
//!
//! The extraction service is loose about shape: headers may arrive as
//! `header` or `headers`, summary rows as `summaryRows` or `summary_rows`,
//! and cells as strings, numbers or nulls. Everything is normalised here so
//! the rest of the crate only ever sees [`Table`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TallyError};
use crate::mapping::FieldDescriptor;

use super::model::Table;

/// A table as delivered by the extraction service, already coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RawTable {
    /// Optional table name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Column names.
    pub header: Vec<String>,
    /// Row cells.
    pub rows: Vec<Vec<String>>,
    /// Summary row indices as given (may be out of range).
    pub summary_rows: Vec<usize>,
    /// Field configuration, if the service supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_config: Option<Vec<FieldDescriptor>>,
    /// Coercions applied while reading the input.
    #[serde(skip)]
    pub issues: Vec<String>,
}

impl RawTable {
    /// Create a raw table from already-clean parts.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header,
            rows,
            ..Default::default()
        }
    }

    /// Read a table, failing instead of coercing when the input is malformed.
    pub fn strict(value: Value) -> Result<Self> {
        let raw = Self::from(value);
        if let Some(issue) = raw.issues.first() {
            return Err(TallyError::DataShape(issue.clone()));
        }
        Ok(raw)
    }

    /// Whether any coercion was needed.
    pub fn was_coerced(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Convert into a canonical [`Table`].
    ///
    /// Rows are padded or truncated to the header width and summary indices
    /// outside the row range are discarded.
    pub fn into_table(self) -> Table {
        let mut table = Table::new(self.header, self.rows).with_summary_rows(self.summary_rows);
        table.name = self.name;
        table.field_config = self.field_config;
        table
    }

    /// Normalise a list of JSON tables. Non-object entries become empty tables.
    pub fn parse_all(value: &Value) -> Vec<RawTable> {
        match value {
            Value::Array(items) => items.iter().cloned().map(RawTable::from).collect(),
            Value::Null => Vec::new(),
            other => vec![RawTable::from(other.clone())],
        }
    }
}

impl From<Value> for RawTable {
    fn from(value: Value) -> Self {
        let mut issues = Vec::new();

        let object = match value {
            Value::Object(map) => map,
            other => {
                issues.push(format!("table is not an object: {}", type_name(&other)));
                Map::new()
            }
        };

        let name = match first_key(&object, &["name", "table_name", "title"]) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(cell_text(other)),
        };

        let header = match first_key(&object, &["header", "headers"]) {
            Some(Value::Array(cells)) => cells.iter().map(cell_text).collect(),
            Some(other) => {
                issues.push(format!("header is not an array: {}", type_name(other)));
                Vec::new()
            }
            None => {
                issues.push("header is missing".to_string());
                Vec::new()
            }
        };

        let rows = if header.is_empty() {
            Vec::new()
        } else {
            match object.get("rows") {
                Some(Value::Array(items)) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| match item {
                        Value::Array(cells) => Some(cells.iter().map(cell_text).collect()),
                        other => {
                            issues.push(format!("row {} is not an array: {}", i, type_name(other)));
                            None
                        }
                    })
                    .collect(),
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    issues.push(format!("rows is not an array: {}", type_name(other)));
                    Vec::new()
                }
            }
        };

        let summary_rows = match first_key(&object, &["summary_rows", "summaryRows"]) {
            Some(Value::Array(items)) => {
                let unique: BTreeSet<usize> = items
                    .iter()
                    .filter_map(|v| v.as_u64().map(|n| n as usize))
                    .collect();
                unique.into_iter().collect()
            }
            _ => Vec::new(),
        };

        let field_config = first_key(&object, &["field_config", "fieldConfig"])
            .and_then(FieldDescriptor::parse_list);

        RawTable {
            name,
            header,
            rows,
            summary_rows,
            field_config,
            issues,
        }
    }
}

fn first_key<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k))
}

/// Render a JSON value as cell text.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_headers_alias_and_mixed_cells() {
        let raw = RawTable::from(json!({
            "headers": ["Agent", "Amount"],
            "rows": [["Alice", 12.5], ["Bob", null]],
            "summaryRows": [1, 1, 7]
        }));

        assert!(!raw.was_coerced());
        let table = raw.into_table();
        assert_eq!(table.header, vec!["Agent", "Amount"]);
        assert_eq!(table.rows[0], vec!["Alice", "12.5"]);
        assert_eq!(table.rows[1], vec!["Bob", ""]);
        assert_eq!(table.summary_rows, BTreeSet::from([1]));
    }

    #[test]
    fn test_non_array_rows_are_dropped() {
        let raw = RawTable::from(json!({
            "header": ["A"],
            "rows": [["1"], "oops", {"x": 1}, ["2"]]
        }));

        assert_eq!(raw.issues.len(), 2);
        assert_eq!(raw.into_table().rows, vec![vec!["1"], vec!["2"]]);
    }

    #[test]
    fn test_missing_header_yields_empty_table() {
        let raw = RawTable::from(json!({"rows": [["1", "2"]]}));
        let table = raw.into_table();
        assert!(table.header.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_strict_reports_shape_error() {
        let err = RawTable::strict(json!({"header": "A,B"})).unwrap_err();
        assert!(matches!(err, TallyError::DataShape(_)));
    }

    #[test]
    fn test_parse_all_handles_non_array() {
        assert!(RawTable::parse_all(&Value::Null).is_empty());
        let tables = RawTable::parse_all(&json!([{"header": ["A"], "rows": []}, 42]));
        assert_eq!(tables.len(), 2);
        assert!(tables[1].was_coerced());
    }
}
