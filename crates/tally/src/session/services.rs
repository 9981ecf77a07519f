//! Interfaces to the backend collaborators of a review session.
//!
//! All calls are synchronous. Implementations must be `Send + Sync` so a
//! controller can hold them behind `Arc` and share one backend between the
//! four roles.

use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::mapping::{FieldDescriptor, FieldMapping};
use crate::table::{RawTable, Table};

use super::snapshot::SessionSnapshot;
use super::step::WorkflowStep;

/// Request to run extraction on an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub upload_id: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    pub method: String,
}

/// Tables and metadata returned by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub tables: Vec<RawTable>,

    #[serde(default, deserialize_with = "lenient_fields")]
    pub field_config: Option<Vec<FieldDescriptor>>,

    #[serde(default)]
    pub plan_types: Vec<String>,

    /// Opaque format-learning data, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_learning: Option<Value>,

    /// Method that actually ran, if the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ExtractionResult {
    /// Create a result from tables.
    pub fn new(tables: Vec<RawTable>) -> Self {
        Self {
            tables,
            ..Default::default()
        }
    }

    /// Parse an extraction result from JSON.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Set the field configuration.
    pub fn with_field_config(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.field_config = Some(fields);
        self
    }

    /// Set the plan types.
    pub fn with_plan_types(mut self, plan_types: Vec<String>) -> Self {
        self.plan_types = plan_types;
        self
    }
}

fn lenient_fields<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<FieldDescriptor>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(FieldDescriptor::parse_list(&value))
}

/// A mapping remembered for tables with a known header structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedMapping {
    pub mapping: FieldMapping,
    #[serde(default)]
    pub field_config: Vec<FieldDescriptor>,
    #[serde(default)]
    pub plan_types: Vec<String>,
    #[serde(default)]
    pub table_names: Vec<String>,
    /// Confidence the service has in the match (0.0-1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// The most recent unfinished session of a reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub upload_id: String,
    pub step: WorkflowStep,
    pub saved_at: DateTime<Utc>,
}

/// Everything the approval service needs to commit or reject a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub upload_id: String,
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub statement_date: Option<NaiveDate>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub plan_types: Vec<String>,
    #[serde(default)]
    pub field_config: Vec<FieldDescriptor>,
    /// Canonical tables, or the edited tables when nothing was mapped yet.
    pub final_data: Vec<Table>,
    /// The mapping step was skipped.
    #[serde(default)]
    pub skipped: bool,
}

/// Runs document extraction.
pub trait ExtractionService: Send + Sync {
    /// Extract tables from an uploaded file.
    fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult>;
}

/// Remembers mappings by header structure.
pub trait MappingLearningService: Send + Sync {
    /// Look up a mapping for a header.
    fn find_learned_mapping(&self, header: &[String], signature: &str) -> Result<Option<LearnedMapping>>;

    /// Remember the mapping a reviewer applied.
    fn save_learned_mapping(&self, header: &[String], signature: &str, learned: &LearnedMapping) -> Result<()>;
}

/// Stores session snapshots for autosave and resume.
pub trait ProgressService: Send + Sync {
    /// Save a snapshot, replacing the one stored for the same upload and step.
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

    /// Load the snapshot for a step, or the latest one when `step` is `None`.
    fn load(&self, upload_id: &str, step: Option<WorkflowStep>) -> Result<Option<SessionSnapshot>>;

    /// The most recently saved unfinished session of a reviewer.
    fn resume_active(&self, actor_id: &str) -> Result<Option<ActiveSession>>;

    /// Drop every snapshot of an upload.
    fn discard(&self, upload_id: &str) -> Result<()>;
}

/// Commits review outcomes.
pub trait ApprovalService: Send + Sync {
    fn approve(&self, request: &ApprovalRequest) -> Result<()>;

    fn reject(&self, request: &ApprovalRequest, reason: &str) -> Result<()>;

    fn send_to_pending(&self, request: &ApprovalRequest) -> Result<()>;
}

/// Handles to the four collaborators.
#[derive(Clone)]
pub struct Services {
    pub extraction: Arc<dyn ExtractionService>,
    pub learning: Arc<dyn MappingLearningService>,
    pub progress: Arc<dyn ProgressService>,
    pub approval: Arc<dyn ApprovalService>,
}

impl Services {
    /// Combine separate implementations.
    pub fn new(
        extraction: Arc<dyn ExtractionService>,
        learning: Arc<dyn MappingLearningService>,
        progress: Arc<dyn ProgressService>,
        approval: Arc<dyn ApprovalService>,
    ) -> Self {
        Self {
            extraction,
            learning,
            progress,
            approval,
        }
    }

    /// Use one backend for every role.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ExtractionService + MappingLearningService + ProgressService + ApprovalService + 'static,
    {
        Self {
            extraction: backend.clone(),
            learning: backend.clone(),
            progress: backend.clone(),
            approval: backend,
        }
    }

    /// Replace the extraction service.
    pub fn with_extraction(mut self, extraction: Arc<dyn ExtractionService>) -> Self {
        self.extraction = extraction;
        self
    }

    /// Replace the mapping-learning service.
    pub fn with_learning(mut self, learning: Arc<dyn MappingLearningService>) -> Self {
        self.learning = learning;
        self
    }
}
