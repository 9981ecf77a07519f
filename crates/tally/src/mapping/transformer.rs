//! Conversion of extracted tables into canonical records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, TallyError};
use crate::table::Table;

use super::field::{FieldDescriptor, FieldMapping};

/// A canonical record: field key to cell value, in field order.
pub type CanonicalRecord = IndexMap<String, String>;

/// Problems found when checking a mapping against a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingValidation {
    /// Required field keys without a source column.
    pub missing_required: Vec<String>,

    /// `(field, column)` pairs whose column is not in the header.
    pub unknown_columns: Vec<(String, String)>,
}

impl MappingValidation {
    /// Whether the mapping can be applied.
    pub fn is_valid(&self) -> bool {
        self.missing_required.is_empty()
    }

    /// Whether nothing at all was reported.
    pub fn is_clean(&self) -> bool {
        self.missing_required.is_empty() && self.unknown_columns.is_empty()
    }
}

/// Turns column-indexed rows into canonical keyed rows.
pub struct FieldMappingTransformer;

impl FieldMappingTransformer {
    /// Create a new transformer.
    pub fn new() -> Self {
        Self
    }

    /// Check a mapping against a field configuration and source header.
    pub fn validate(
        &self,
        mapping: &FieldMapping,
        fields: &[FieldDescriptor],
        header: &[String],
    ) -> MappingValidation {
        let missing_required = fields
            .iter()
            .filter(|f| f.required && !mapping.is_mapped(&f.key))
            .map(|f| f.key.clone())
            .collect();

        let unknown_columns = mapping
            .iter()
            .filter(|(_, column)| !column.is_empty() && !header.iter().any(|h| h == column))
            .map(|(field, column)| (field.to_string(), column.to_string()))
            .collect();

        MappingValidation {
            missing_required,
            unknown_columns,
        }
    }

    /// Apply a mapping to every table of a document.
    ///
    /// Each output table has the canonical field keys as its header, one
    /// cell per field per row (copied from the mapped source column, or
    /// empty when unmapped or the column is absent), the source row order
    /// and summary rows, and `fields` as its field configuration. With no
    /// field configuration the mapping's own keys are used.
    ///
    /// Fails with a validation error when a required field is unmapped.
    pub fn apply(
        &self,
        tables: &[Table],
        mapping: &FieldMapping,
        fields: &[FieldDescriptor],
    ) -> Result<Vec<Table>> {
        let fields = if fields.is_empty() {
            mapping.implied_fields()
        } else {
            fields.to_vec()
        };

        let missing: Vec<&str> = fields
            .iter()
            .filter(|f| f.required && !mapping.is_mapped(&f.key))
            .map(|f| f.key.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(TallyError::Validation(format!(
                "Required fields not mapped: {}",
                missing.join(", ")
            )));
        }

        let header: Vec<String> = fields.iter().map(|f| f.key.clone()).collect();
        let mapped = tables
            .iter()
            .map(|table| {
                let sources: Vec<Option<usize>> = fields
                    .iter()
                    .map(|f| mapping.source_for(&f.key).and_then(|c| table.column_index(c)))
                    .collect();

                let rows = table
                    .rows
                    .iter()
                    .map(|row| {
                        sources
                            .iter()
                            .map(|src| src.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                            .collect()
                    })
                    .collect();

                let mut out = Table::new(header.clone(), rows)
                    .with_summary_rows(table.summary_rows.iter().copied());
                out.name = table.name.clone();
                out.field_config = Some(fields.clone());
                out
            })
            .collect::<Vec<_>>();

        debug!(tables = mapped.len(), fields = fields.len(), "applied field mapping");
        Ok(mapped)
    }

    /// Pass tables through unchanged, generating a field configuration from
    /// each table's own header.
    pub fn skip(&self, tables: &[Table]) -> Vec<Table> {
        tables
            .iter()
            .map(|table| {
                let mut out = table.clone();
                out.field_config = Some(
                    table
                        .header
                        .iter()
                        .map(|h| FieldDescriptor::from_header(h))
                        .collect(),
                );
                out
            })
            .collect()
    }
}

impl Default for FieldMappingTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Key each row of a table by its header.
pub fn to_records(table: &Table) -> Vec<CanonicalRecord> {
    table
        .rows
        .iter()
        .map(|row| {
            table
                .header
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
        .collect()
}

/// Content hash of a header, used to look up learned mappings.
///
/// Header cells are trimmed and lowercased, joined by the unit separator and
/// hashed with SHA-256.
pub fn structural_signature(header: &[String]) -> String {
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.join("\u{1f}").as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn source() -> Table {
        Table::new(
            s(&["Agent", "Region", "Commission"]),
            vec![s(&["Alice", "West", "120.00"]), s(&["Total", "", "120.00"])],
        )
        .with_summary_rows([1])
    }

    fn mapping() -> FieldMapping {
        FieldMapping::new()
            .with("agent_name", "Agent")
            .with("commission", "Commission")
    }

    #[test]
    fn test_apply_produces_canonical_rows() {
        let out = FieldMappingTransformer::new()
            .apply(&[source()], &mapping(), &[])
            .unwrap();

        let records = to_records(&out[0]);
        assert_eq!(records[0]["agent_name"], "Alice");
        assert_eq!(records[0]["commission"], "120.00");
        assert_eq!(records[0].len(), 2);
        assert_eq!(out[0].summary_rows, BTreeSet::from([1]));
    }

    #[test]
    fn test_unmapped_and_missing_columns_are_empty() {
        let fields = vec![
            FieldDescriptor::new("agent_name", "Agent"),
            FieldDescriptor::new("plan", "Plan"),
            FieldDescriptor::new("policy", "Policy"),
        ];
        let mapping = FieldMapping::new()
            .with("agent_name", "Agent")
            .with("policy", "Policy No");

        let out = FieldMappingTransformer::new()
            .apply(&[source()], &mapping, &fields)
            .unwrap();

        assert_eq!(out[0].header, s(&["agent_name", "plan", "policy"]));
        assert_eq!(out[0].rows[0], s(&["Alice", "", ""]));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let transformer = FieldMappingTransformer::new();
        let tables = vec![source(), source().with_name("Page 2")];
        let first = transformer.apply(&tables, &mapping(), &[]).unwrap();
        let second = transformer.apply(&tables, &mapping(), &[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_required_field_must_be_mapped() {
        let fields = vec![
            FieldDescriptor::new("agent_name", "Agent").required(),
            FieldDescriptor::new("carrier", "Carrier").required(),
        ];
        let err = FieldMappingTransformer::new()
            .apply(&[source()], &mapping(), &fields)
            .unwrap_err();
        assert!(matches!(err, TallyError::Validation(msg) if msg.contains("carrier")));
    }

    #[test]
    fn test_validate_reports_unknown_columns() {
        let fields = vec![FieldDescriptor::new("agent_name", "Agent").required()];
        let mapping = FieldMapping::new()
            .with("agent_name", "Agent")
            .with("rate", "Rate %");

        let report = FieldMappingTransformer::new().validate(&mapping, &fields, &source().header);
        assert!(report.is_valid());
        assert!(!report.is_clean());
        assert_eq!(report.unknown_columns, vec![("rate".to_string(), "Rate %".to_string())]);
    }

    #[test]
    fn test_skip_keeps_header() {
        let out = FieldMappingTransformer::new().skip(&[source()]);
        assert_eq!(out[0].header, source().header);
        let labels: Vec<String> = out[0]
            .field_config
            .as_ref()
            .unwrap()
            .iter()
            .map(|f| f.label.clone())
            .collect();
        assert_eq!(labels, source().header);
    }

    #[test]
    fn test_structural_signature_normalizes() {
        let a = structural_signature(&s(&["Agent ", "COMMISSION"]));
        let b = structural_signature(&s(&["agent", "commission"]));
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
        assert_ne!(a, structural_signature(&s(&["commission", "agent"])));
    }
}
