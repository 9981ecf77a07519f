//! Workflow steps of a review session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// How a completed review ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Approved,
    Rejected,
}

/// Where a review session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WorkflowStep {
    /// Waiting for an extraction result.
    Upload,
    /// Reviewing and correcting extracted tables.
    TableEditor,
    /// Mapping columns onto canonical fields.
    FieldMapper,
    /// Final check before approval.
    Dashboard,
    /// Review finished.
    Completed(CompletionStatus),
    /// Parked for later; can be resumed.
    Pending,
}

impl WorkflowStep {
    /// Stable name used in persisted snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Upload => "upload",
            WorkflowStep::TableEditor => "table_editor",
            WorkflowStep::FieldMapper => "field_mapper",
            WorkflowStep::Dashboard => "dashboard",
            WorkflowStep::Completed(CompletionStatus::Approved) => "approved",
            WorkflowStep::Completed(CompletionStatus::Rejected) => "rejected",
            WorkflowStep::Pending => "pending",
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowStep::Upload => "Upload",
            WorkflowStep::TableEditor => "Table editor",
            WorkflowStep::FieldMapper => "Field mapper",
            WorkflowStep::Dashboard => "Dashboard",
            WorkflowStep::Completed(CompletionStatus::Approved) => "Approved",
            WorkflowStep::Completed(CompletionStatus::Rejected) => "Rejected",
            WorkflowStep::Pending => "Pending",
        }
    }

    /// Whether the review has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStep::Completed(_))
    }

    /// Whether the reviewer is actively working in this step.
    ///
    /// Autosave only runs in these steps.
    pub fn is_editing(&self) -> bool {
        matches!(
            self,
            WorkflowStep::TableEditor | WorkflowStep::FieldMapper | WorkflowStep::Dashboard
        )
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "upload" => Ok(WorkflowStep::Upload),
            "table_editor" => Ok(WorkflowStep::TableEditor),
            "field_mapper" => Ok(WorkflowStep::FieldMapper),
            "dashboard" => Ok(WorkflowStep::Dashboard),
            "approved" => Ok(WorkflowStep::Completed(CompletionStatus::Approved)),
            "rejected" => Ok(WorkflowStep::Completed(CompletionStatus::Rejected)),
            "pending" => Ok(WorkflowStep::Pending),
            other => Err(TallyError::Validation(format!(
                "Unknown workflow step '{}'",
                other
            ))),
        }
    }
}

impl From<WorkflowStep> for String {
    fn from(step: WorkflowStep) -> Self {
        step.as_str().to_string()
    }
}

impl TryFrom<String> for WorkflowStep {
    type Error = TallyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for step in [
            WorkflowStep::Upload,
            WorkflowStep::TableEditor,
            WorkflowStep::FieldMapper,
            WorkflowStep::Dashboard,
            WorkflowStep::Completed(CompletionStatus::Approved),
            WorkflowStep::Completed(CompletionStatus::Rejected),
            WorkflowStep::Pending,
        ] {
            assert_eq!(step.as_str().parse::<WorkflowStep>().unwrap(), step);
        }
        assert!("review".parse::<WorkflowStep>().is_err());
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&WorkflowStep::FieldMapper).unwrap();
        assert_eq!(json, "\"field_mapper\"");
        let step: WorkflowStep = serde_json::from_str("\"approved\"").unwrap();
        assert!(step.is_terminal());
    }

    #[test]
    fn test_editing_steps() {
        assert!(!WorkflowStep::Upload.is_editing());
        assert!(WorkflowStep::Dashboard.is_editing());
        assert!(!WorkflowStep::Pending.is_editing());
        assert!(!WorkflowStep::Completed(CompletionStatus::Rejected).is_editing());
    }
}
