//! Persisted review progress.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::mapping::{FieldDescriptor, FieldMapping, MappingSuggestion};
use crate::table::Table;

use super::step::WorkflowStep;

/// Everything needed to rebuild a session at its recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub upload_id: String,

    pub current_step: WorkflowStep,

    /// Reference to the uploaded file.
    #[serde(default)]
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,

    /// Tables as edited in the table editor.
    #[serde(default)]
    pub tables: Vec<Table>,

    /// Canonical tables, once a mapping was applied or skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_data: Option<Vec<Table>>,

    #[serde(default)]
    pub field_config: Vec<FieldDescriptor>,

    #[serde(default)]
    pub mapping: FieldMapping,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<MappingSuggestion>,

    #[serde(default)]
    pub plan_types: Vec<String>,

    #[serde(default)]
    pub selected_statement_date: Option<NaiveDate>,

    #[serde(default)]
    pub carrier: Option<String>,

    /// Summary row indices, one list per table.
    #[serde(default)]
    pub summary_rows: Vec<Vec<usize>>,

    /// Rows the reviewer explicitly unmarked, one list per table.
    #[serde(default)]
    pub unmarked_rows: Vec<Vec<usize>>,

    #[serde(default)]
    pub selected_table: usize,

    /// The mapping step was skipped.
    #[serde(default)]
    pub skipped: bool,

    /// Step to return to when a pending session is resumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<WorkflowStep>,
}

impl SnapshotPayload {
    /// Tables with their summary rows taken from `summary_rows`.
    ///
    /// Tables are normalised so they satisfy the width and index invariants
    /// even if the stored payload was edited by hand.
    pub fn restored_tables(&self) -> Vec<Table> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, table)| {
                let mut table = table.clone();
                if let Some(rows) = self.summary_rows.get(i) {
                    table.summary_rows = rows.iter().copied().collect();
                }
                table.normalize();
                table
            })
            .collect()
    }
}

/// A saved payload with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub upload_id: String,

    /// Reviewer who saved it.
    pub actor_id: String,

    pub step: WorkflowStep,

    pub payload: SnapshotPayload,

    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Wrap a payload, stamped with the current time.
    pub fn new(actor_id: impl Into<String>, payload: SnapshotPayload) -> Self {
        Self {
            upload_id: payload.upload_id.clone(),
            actor_id: actor_id.into(),
            step: payload.current_step,
            payload,
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn payload() -> SnapshotPayload {
        SnapshotPayload {
            upload_id: "up-1".to_string(),
            current_step: WorkflowStep::FieldMapper,
            file: "statement.pdf".to_string(),
            environment_id: None,
            extraction_method: None,
            tables: vec![Table::new(
                vec!["A".to_string()],
                vec![vec!["x".to_string()], vec!["Total".to_string()]],
            )],
            final_data: None,
            field_config: vec![FieldDescriptor::new("agent_name", "Agent")],
            mapping: FieldMapping::new().with("agent_name", "A"),
            suggestions: Vec::new(),
            plan_types: vec!["Medical".to_string()],
            selected_statement_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            carrier: None,
            summary_rows: vec![vec![1, 9]],
            unmarked_rows: vec![vec![0]],
            selected_table: 0,
            skipped: false,
            paused_at: None,
        }
    }

    #[test]
    fn test_restored_tables_apply_summary_rows() {
        let tables = payload().restored_tables();
        assert_eq!(tables[0].summary_rows, BTreeSet::from([1]));
    }

    #[test]
    fn test_payload_json_round_trip() {
        let payload = payload();
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"current_step\":\"field_mapper\""));
        assert!(json.contains("\"selected_statement_date\":\"2024-03-31\""));

        let back: SnapshotPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_without_unmarks_still_loads() {
        let mut value = serde_json::to_value(payload()).unwrap();
        value.as_object_mut().unwrap().remove("unmarked_rows");

        let back: SnapshotPayload = serde_json::from_value(value).unwrap();
        assert!(back.unmarked_rows.is_empty());
    }
}
