//! The review workflow state machine.

use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ReviewConfig;
use crate::error::{Result, TallyError};
use crate::history::{ExtractionAttempt, ExtractionHistory};
use crate::mapping::{
    accept_high_band, accepted_mapping, best_table, group_by_confidence, structural_signature,
    suggest_from_header, ConfidenceGroups, FieldDescriptor, FieldMapping, FieldMappingTransformer,
    MappingSuggestion, MappingValidation,
};
use crate::summary::SummaryRowClassifier;
use crate::table::{Table, TableStore};

use super::context::{SessionContext, Upload};
use super::services::{ApprovalRequest, ExtractionRequest, ExtractionResult, LearnedMapping, Services};
use super::snapshot::{SessionSnapshot, SnapshotPayload};
use super::step::{CompletionStatus, WorkflowStep};

/// Method recorded for the first extraction when none is given.
const INITIAL_METHOD: &str = "initial";

/// Result of a controller operation, for the host to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step after the operation.
    pub step: WorkflowStep,
    /// Message the host may show.
    pub notice: String,
}

impl StepOutcome {
    fn new(step: WorkflowStep, notice: impl Into<String>) -> Self {
        Self {
            step,
            notice: notice.into(),
        }
    }
}

/// Mutable review state. Transitions work on a copy that replaces the live
/// state only after it was persisted.
#[derive(Debug, Clone)]
struct ReviewState {
    step: WorkflowStep,
    upload: Option<Upload>,
    store: TableStore,
    history: ExtractionHistory,
    mapping: FieldMapping,
    field_config: Vec<FieldDescriptor>,
    suggestions: Vec<MappingSuggestion>,
    plan_types: Vec<String>,
    statement_date: Option<NaiveDate>,
    carrier: Option<String>,
    final_data: Option<Vec<Table>>,
    skipped: bool,
    paused_at: Option<WorkflowStep>,
}

impl ReviewState {
    fn new(undo_depth: usize) -> Self {
        Self {
            step: WorkflowStep::Upload,
            upload: None,
            store: TableStore::default().with_undo_depth(undo_depth),
            history: ExtractionHistory::new(),
            mapping: FieldMapping::new(),
            field_config: Vec::new(),
            suggestions: Vec::new(),
            plan_types: Vec::new(),
            statement_date: None,
            carrier: None,
            final_data: None,
            skipped: false,
            paused_at: None,
        }
    }

    fn payload(&self) -> Option<SnapshotPayload> {
        let upload = self.upload.as_ref()?;
        let tables = self.store.to_tables();
        Some(SnapshotPayload {
            upload_id: upload.id.clone(),
            current_step: self.step,
            file: upload.file.clone(),
            environment_id: upload.environment_id.clone(),
            extraction_method: upload.extraction_method.clone(),
            summary_rows: tables
                .iter()
                .map(|t| t.summary_rows.iter().copied().collect())
                .collect(),
            unmarked_rows: self.store.unmarked_by_table(),
            tables,
            final_data: self.final_data.clone(),
            field_config: self.field_config.clone(),
            mapping: self.mapping.clone(),
            suggestions: self.suggestions.clone(),
            plan_types: self.plan_types.clone(),
            selected_statement_date: self.statement_date,
            carrier: self.carrier.clone(),
            selected_table: self.store.selected_index(),
            skipped: self.skipped,
            paused_at: self.paused_at,
        })
    }

    fn from_payload(payload: SnapshotPayload, undo_depth: usize) -> Self {
        let tables = payload.restored_tables();
        let method = payload
            .extraction_method
            .clone()
            .unwrap_or_else(|| INITIAL_METHOD.to_string());

        let mut store = TableStore::new(tables.clone()).with_undo_depth(undo_depth);
        store.restore_unmarked(&payload.unmarked_rows);
        if store.select_table(payload.selected_table).is_err() {
            debug!(index = payload.selected_table, "stored table selection out of range");
        }

        let mut history = ExtractionHistory::new();
        if !tables.is_empty() {
            history.push(ExtractionAttempt::new(method, tables));
        }

        Self {
            step: payload.current_step,
            upload: Some(Upload {
                id: payload.upload_id,
                file: payload.file,
                environment_id: payload.environment_id,
                extraction_method: payload.extraction_method,
            }),
            store,
            history,
            mapping: payload.mapping,
            field_config: payload.field_config,
            suggestions: payload.suggestions,
            plan_types: payload.plan_types,
            statement_date: payload.selected_statement_date,
            carrier: payload.carrier,
            final_data: payload.final_data,
            skipped: payload.skipped,
            paused_at: payload.paused_at,
        }
    }
}

/// Drives one reviewer through the review of one document at a time.
///
/// Every step transition is persisted through the progress service before it
/// takes effect; if the save fails the operation returns the error and the
/// session stays where it was. Autosave between transitions is best-effort.
pub struct SessionController {
    config: ReviewConfig,
    context: SessionContext,
    services: Services,
    classifier: SummaryRowClassifier,
    transformer: FieldMappingTransformer,
    state: ReviewState,
    last_autosave: Option<Instant>,
}

impl SessionController {
    /// Create a controller in the upload step.
    pub fn new(config: ReviewConfig, context: SessionContext, services: Services) -> Self {
        let classifier = SummaryRowClassifier::from_config(&config);
        let state = ReviewState::new(config.undo_depth);
        Self {
            config,
            context,
            services,
            classifier,
            transformer: FieldMappingTransformer::new(),
            state,
            last_autosave: None,
        }
    }

    // Read-only views

    /// Current workflow step.
    pub fn step(&self) -> WorkflowStep {
        self.state.step
    }

    /// The document under review.
    pub fn upload(&self) -> Option<&Upload> {
        self.state.upload.as_ref()
    }

    /// Reviewer and environment.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Session configuration.
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// The summary-row classifier in use.
    pub fn classifier(&self) -> &SummaryRowClassifier {
        &self.classifier
    }

    /// The edited tables.
    pub fn store(&self) -> &TableStore {
        &self.state.store
    }

    /// Extraction attempts of this upload.
    pub fn history(&self) -> &ExtractionHistory {
        &self.state.history
    }

    /// Current field mapping.
    pub fn mapping(&self) -> &FieldMapping {
        &self.state.mapping
    }

    /// Current field configuration.
    pub fn field_config(&self) -> &[FieldDescriptor] {
        &self.state.field_config
    }

    /// Mapping suggestions in their original order.
    pub fn suggestions(&self) -> &[MappingSuggestion] {
        &self.state.suggestions
    }

    /// Suggestions grouped by confidence band for display.
    pub fn suggestion_groups(&self) -> ConfidenceGroups {
        group_by_confidence(&self.state.suggestions, &self.config.confidence)
    }

    pub fn plan_types(&self) -> &[String] {
        &self.state.plan_types
    }

    pub fn statement_date(&self) -> Option<NaiveDate> {
        self.state.statement_date
    }

    pub fn carrier(&self) -> Option<&str> {
        self.state.carrier.as_deref()
    }

    /// Canonical tables, once the mapping was applied or skipped.
    pub fn final_data(&self) -> Option<&[Table]> {
        self.state.final_data.as_deref()
    }

    /// Whether the mapping step was skipped.
    pub fn is_skipped(&self) -> bool {
        self.state.skipped
    }

    /// The payload an autosave would write now.
    pub fn snapshot_payload(&self) -> Option<SnapshotPayload> {
        self.state.payload()
    }

    // Upload

    /// Run the extraction service on a new upload and start reviewing.
    pub fn start_extraction(&mut self, upload: Upload, method: Option<&str>) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::Upload], "start an extraction")?;
        let method = method
            .map(str::to_string)
            .or_else(|| upload.extraction_method.clone())
            .unwrap_or_else(|| INITIAL_METHOD.to_string());

        let result = self.services.extraction.extract(&ExtractionRequest {
            upload_id: upload.id.clone(),
            file: upload.file.clone(),
            environment_id: upload.environment_id.clone(),
            method: method.clone(),
        })?;
        self.receive_extraction(upload.with_method(method), result)
    }

    /// Start reviewing an extraction result.
    pub fn receive_extraction(&mut self, upload: Upload, result: ExtractionResult) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::Upload], "receive an extraction")?;

        let method = result
            .method
            .clone()
            .or_else(|| upload.extraction_method.clone())
            .unwrap_or_else(|| INITIAL_METHOD.to_string());

        let mut next = ReviewState::new(self.config.undo_depth);
        next.upload = Some(Upload {
            extraction_method: Some(method.clone()),
            environment_id: upload
                .environment_id
                .clone()
                .or_else(|| self.context.environment_id.clone()),
            ..upload
        });
        next.field_config = result.field_config.clone().unwrap_or_default();
        next.plan_types = result.plan_types.clone();
        let tables = self.ingest(result);
        next.history.push(ExtractionAttempt::new(method, tables.clone()));
        next.store.replace_all(tables);
        if let Some(best) = best_table(&next.store.to_tables()) {
            next.store.select_table(best)?;
        }
        next.step = WorkflowStep::TableEditor;

        let count = next.store.table_count();
        self.commit(next)?;
        info!(upload = %self.upload_id(), tables = count, "extraction received");
        Ok(StepOutcome::new(
            WorkflowStep::TableEditor,
            format!("{} table(s) extracted", count),
        ))
    }

    // Table editor

    /// The table store, for editing. Only available in the table editor.
    pub fn store_mut(&mut self) -> Result<&mut TableStore> {
        self.require(&[WorkflowStep::TableEditor], "edit tables")?;
        Ok(&mut self.state.store)
    }

    /// Run summary-row detection over the selected table.
    pub fn auto_detect_summary_rows(&mut self) -> Result<Vec<usize>> {
        self.require(&[WorkflowStep::TableEditor], "detect summary rows")?;
        self.state.store.auto_detect_summary_rows(&self.classifier)
    }

    /// Flag every row similar to a reference row as a summary row.
    pub fn mark_similar_rows(&mut self, reference: usize) -> Result<Vec<usize>> {
        self.require(&[WorkflowStep::TableEditor], "mark summary rows")?;
        self.state.store.mark_similar_rows(reference, &self.classifier)
    }

    /// Choose the table the mapping works on.
    pub fn select_table(&mut self, index: usize) -> Result<()> {
        self.require(
            &[WorkflowStep::TableEditor, WorkflowStep::FieldMapper],
            "select a table",
        )?;
        self.state.store.select_table(index)
    }

    /// Run extraction again with another method.
    ///
    /// On success the new tables replace the live tables, discarding edits,
    /// and become the newest history entry after the cursor.
    pub fn retry_extraction(&mut self, method: &str) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::TableEditor], "retry extraction")?;
        let upload = self.current_upload()?.clone();

        let result = self.services.extraction.extract(&ExtractionRequest {
            upload_id: upload.id.clone(),
            file: upload.file.clone(),
            environment_id: upload.environment_id.clone(),
            method: method.to_string(),
        })?;

        let method = result.method.clone().unwrap_or_else(|| method.to_string());
        if let Some(fields) = result.field_config.clone() {
            self.state.field_config = fields;
        }
        if !result.plan_types.is_empty() {
            self.state.plan_types = result.plan_types.clone();
        }
        let tables = self.ingest(result);
        self.state.history.push(ExtractionAttempt::new(method.clone(), tables.clone()));
        self.load_tables(tables, &method);

        info!(upload = %upload.id, method = %method, "extraction retried");
        self.autosave();
        Ok(StepOutcome::new(
            self.state.step,
            format!("Re-extracted with '{}'", method),
        ))
    }

    /// Return to the previous extraction attempt.
    pub fn previous_extraction(&mut self) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::TableEditor], "go to a previous extraction")?;
        let attempt = self
            .state
            .history
            .go_back()
            .cloned()
            .ok_or_else(|| TallyError::StateConflict("No earlier extraction attempt".to_string()))?;

        self.load_tables(attempt.tables, &attempt.method);
        self.autosave();
        Ok(StepOutcome::new(
            self.state.step,
            format!("Restored extraction '{}'", attempt.method),
        ))
    }

    /// Finish table editing and move to the field mapper.
    ///
    /// A learned mapping for the selected table's header seeds the mapping,
    /// field configuration and plan types. Without one, suggestions are
    /// derived from the header names.
    pub fn save_tables(&mut self) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::TableEditor], "save tables")?;
        let header = self
            .state
            .store
            .selected_table()
            .map(|t| t.header.clone())
            .ok_or_else(|| TallyError::Validation("No table to map".to_string()))?;

        let mut next = self.state.clone();
        next.step = WorkflowStep::FieldMapper;

        let notice = match self.find_learned(&header) {
            Some(learned) => {
                let confidence = learned.confidence.unwrap_or(1.0);
                if !learned.field_config.is_empty() {
                    next.field_config = learned.field_config;
                }
                if !learned.plan_types.is_empty() {
                    next.plan_types = learned.plan_types;
                }
                next.suggestions = learned
                    .mapping
                    .iter()
                    .map(|(field, column)| {
                        let mut s = MappingSuggestion::new(field, column, confidence)
                            .with_reasoning("Learned from an earlier statement with the same layout");
                        s.accepted = true;
                        s
                    })
                    .collect();
                next.mapping = learned.mapping;
                "Applied learned mapping".to_string()
            }
            None => {
                next.suggestions =
                    suggest_from_header(&header, &next.field_config, &self.config.confidence);
                next.mapping = accepted_mapping(&next.suggestions);
                format!("{} mapping suggestion(s)", next.suggestions.len())
            }
        };

        self.commit(next)?;
        Ok(StepOutcome::new(WorkflowStep::FieldMapper, notice))
    }

    // Field mapper

    /// Map a field to a source column.
    pub fn set_mapping(&mut self, field: &str, column: &str) -> Result<()> {
        self.require(&[WorkflowStep::FieldMapper], "change the mapping")?;
        self.state.mapping.insert(field, column);
        Ok(())
    }

    /// Clear a field's mapping.
    pub fn clear_mapping(&mut self, field: &str) -> Result<()> {
        self.require(&[WorkflowStep::FieldMapper], "change the mapping")?;
        self.state.mapping.remove(field);
        for suggestion in self.state.suggestions.iter_mut().filter(|s| s.field_key == field) {
            suggestion.accepted = false;
        }
        Ok(())
    }

    /// Replace the field configuration.
    pub fn set_field_config(&mut self, fields: Vec<FieldDescriptor>) -> Result<()> {
        self.require(&[WorkflowStep::FieldMapper], "change the field configuration")?;
        self.state.field_config = fields;
        Ok(())
    }

    /// Accept the suggestion for one field.
    pub fn accept_suggestion(&mut self, field: &str) -> Result<()> {
        self.require(&[WorkflowStep::FieldMapper], "accept a suggestion")?;
        let suggestion = self
            .state
            .suggestions
            .iter_mut()
            .find(|s| s.field_key == field)
            .ok_or_else(|| TallyError::Validation(format!("No suggestion for field '{}'", field)))?;
        suggestion.accepted = true;
        let column = suggestion.source_column.clone();
        self.state.mapping.insert(field, column);
        Ok(())
    }

    /// Accept every high-confidence suggestion. Returns how many changed.
    pub fn accept_high_confidence(&mut self) -> Result<usize> {
        self.require(&[WorkflowStep::FieldMapper], "accept suggestions")?;
        let changed = accept_high_band(&mut self.state.suggestions, &self.config.confidence);
        for (field, column) in accepted_mapping(&self.state.suggestions).iter() {
            if !self.state.mapping.is_mapped(field) {
                self.state.mapping.insert(field, column);
            }
        }
        Ok(changed)
    }

    /// Check the mapping against the field configuration and selected table.
    pub fn validate_mapping(&self) -> MappingValidation {
        let header = self
            .state
            .store
            .selected_table()
            .map(|t| t.header.clone())
            .unwrap_or_default();
        self.transformer
            .validate(&self.state.mapping, &self.state.field_config, &header)
    }

    /// Apply the mapping and move to the dashboard.
    pub fn apply_mapping(&mut self) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::FieldMapper], "apply the mapping")?;

        let tables = self.state.store.to_tables();
        let mapped = self
            .transformer
            .apply(&tables, &self.state.mapping, &self.state.field_config)?;

        let mut next = self.state.clone();
        if next.field_config.is_empty() {
            next.field_config = next.mapping.implied_fields();
        }
        next.final_data = Some(mapped);
        next.skipped = false;
        next.step = WorkflowStep::Dashboard;
        self.commit(next)?;

        self.remember_mapping();
        Ok(StepOutcome::new(WorkflowStep::Dashboard, "Mapping applied"))
    }

    /// Skip mapping: tables pass through with their own headers as fields.
    pub fn skip_mapping(&mut self) -> Result<StepOutcome> {
        self.require(&[WorkflowStep::FieldMapper], "skip the mapping")?;

        let passed = self.transformer.skip(&self.state.store.to_tables());
        let mut next = self.state.clone();
        next.field_config = passed
            .get(next.store.selected_index())
            .and_then(|t| t.field_config.clone())
            .unwrap_or_default();
        next.final_data = Some(passed);
        next.skipped = true;
        next.step = WorkflowStep::Dashboard;
        self.commit(next)?;
        Ok(StepOutcome::new(WorkflowStep::Dashboard, "Mapping skipped"))
    }

    pub fn set_plan_types(&mut self, plan_types: Vec<String>) -> Result<()> {
        self.require_open("set plan types")?;
        self.state.plan_types = plan_types;
        Ok(())
    }

    pub fn set_statement_date(&mut self, date: Option<NaiveDate>) -> Result<()> {
        self.require_open("set the statement date")?;
        self.state.statement_date = date;
        Ok(())
    }

    pub fn set_carrier(&mut self, carrier: Option<String>) -> Result<()> {
        self.require_open("set the carrier")?;
        self.state.carrier = carrier.filter(|c| !c.trim().is_empty());
        Ok(())
    }

    // Dashboard

    /// Approve the document.
    pub fn approve(&mut self) -> Result<StepOutcome> {
        let request = self.approval_request("approve")?;
        self.services.approval.approve(&request)?;
        Ok(self.complete(CompletionStatus::Approved))
    }

    /// Reject the document with a reason.
    pub fn reject(&mut self, reason: &str) -> Result<StepOutcome> {
        if reason.trim().is_empty() {
            return Err(TallyError::Validation(
                "A rejection reason is required".to_string(),
            ));
        }
        let request = self.approval_request("reject")?;
        self.services.approval.reject(&request, reason.trim())?;
        Ok(self.complete(CompletionStatus::Rejected))
    }

    /// Park the document for later.
    pub fn send_to_pending(&mut self) -> Result<StepOutcome> {
        self.require_open("send to pending")?;
        let request = self.build_request()?;
        self.services.approval.send_to_pending(&request)?;

        let mut next = self.state.clone();
        next.paused_at = Some(self.state.step);
        next.step = WorkflowStep::Pending;
        self.commit(next)?;
        Ok(StepOutcome::new(WorkflowStep::Pending, "Sent to pending"))
    }

    // Navigation

    /// Go back one step: mapper to editor, dashboard to mapper.
    pub fn go_back(&mut self) -> Result<StepOutcome> {
        let target = match self.state.step {
            WorkflowStep::FieldMapper => WorkflowStep::TableEditor,
            WorkflowStep::Dashboard => WorkflowStep::FieldMapper,
            step => {
                return Err(TallyError::StateConflict(format!(
                    "Cannot go back from {}",
                    step.label()
                )));
            }
        };

        let mut next = self.state.clone();
        if target == WorkflowStep::FieldMapper {
            next.final_data = None;
            next.skipped = false;
        }
        next.step = target;
        self.commit(next)?;
        Ok(StepOutcome::new(target, format!("Back to {}", target.label())))
    }

    /// Discard the session and return to upload.
    pub fn reset(&mut self) -> StepOutcome {
        if let Some(upload) = &self.state.upload {
            if let Err(err) = self.services.progress.discard(&upload.id) {
                warn!(error = %err, upload = %upload.id, "failed to discard session snapshot");
            }
        }
        self.state = ReviewState::new(self.config.undo_depth);
        self.last_autosave = None;
        StepOutcome::new(WorkflowStep::Upload, "Session reset")
    }

    /// Rebuild the session of an upload from its latest snapshot.
    pub fn resume(&mut self, upload_id: &str) -> Result<StepOutcome> {
        let snapshot = self
            .services
            .progress
            .load(upload_id, None)?
            .ok_or_else(|| TallyError::Validation(format!("No saved session for '{}'", upload_id)))?;
        self.restore(snapshot)
    }

    /// Resume the reviewer's most recent unfinished session, if any.
    pub fn resume_active(&mut self) -> Result<Option<StepOutcome>> {
        let Some(active) = self.services.progress.resume_active(&self.context.actor_id)? else {
            return Ok(None);
        };
        self.resume(&active.upload_id).map(Some)
    }

    fn restore(&mut self, snapshot: SessionSnapshot) -> Result<StepOutcome> {
        if snapshot.step.is_terminal() {
            return Err(TallyError::StateConflict(format!(
                "Upload '{}' is already {}",
                snapshot.upload_id,
                snapshot.step.label().to_lowercase()
            )));
        }

        let mut state = ReviewState::from_payload(snapshot.payload, self.config.undo_depth);
        if state.step == WorkflowStep::Pending {
            state.step = state.paused_at.take().unwrap_or(WorkflowStep::Dashboard);
        }
        if state.step == WorkflowStep::Dashboard && state.final_data.is_none() {
            state.step = WorkflowStep::FieldMapper;
        }

        let step = state.step;
        self.state = state;
        self.last_autosave = Some(Instant::now());
        info!(upload = %self.upload_id(), step = %step, "session resumed");
        Ok(StepOutcome::new(step, format!("Resumed at {}", step.label())))
    }

    // Autosave

    /// Autosave if the configured interval has passed since the last attempt.
    ///
    /// Returns whether a snapshot was saved.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.state.step.is_editing() {
            return false;
        }
        let due = self
            .last_autosave
            .is_none_or(|last| now.saturating_duration_since(last) >= self.config.autosave_interval());
        if !due {
            return false;
        }
        self.last_autosave = Some(now);
        self.autosave()
    }

    /// Save immediately because the host is going away.
    pub fn on_page_exit(&mut self) -> bool {
        if !self.state.step.is_editing() {
            return false;
        }
        self.autosave()
    }

    fn autosave(&mut self) -> bool {
        if !self.state.step.is_editing() {
            return false;
        }
        let Some(payload) = self.state.payload() else {
            return false;
        };
        let snapshot = SessionSnapshot::new(self.context.actor_id.clone(), payload);
        match self.services.progress.save(&snapshot) {
            Ok(()) => {
                debug!(upload = %snapshot.upload_id, step = %snapshot.step, "autosaved");
                true
            }
            Err(err) => {
                warn!(error = %err, upload = %snapshot.upload_id, "autosave failed; will retry");
                false
            }
        }
    }

    // Helpers

    fn upload_id(&self) -> &str {
        self.state.upload.as_ref().map(|u| u.id.as_str()).unwrap_or("")
    }

    fn current_upload(&self) -> Result<&Upload> {
        self.state
            .upload
            .as_ref()
            .ok_or_else(|| TallyError::StateConflict("No upload in progress".to_string()))
    }

    fn require(&self, allowed: &[WorkflowStep], action: &str) -> Result<()> {
        if allowed.contains(&self.state.step) {
            return Ok(());
        }
        Err(TallyError::StateConflict(format!(
            "Cannot {} in step {}",
            action,
            self.state.step.label()
        )))
    }

    fn require_open(&self, action: &str) -> Result<()> {
        if self.state.step.is_editing() {
            return Ok(());
        }
        Err(TallyError::StateConflict(format!(
            "Cannot {} in step {}",
            action,
            self.state.step.label()
        )))
    }

    /// Persist `next` and make it the live state.
    fn commit(&mut self, next: ReviewState) -> Result<()> {
        let payload = next
            .payload()
            .ok_or_else(|| TallyError::StateConflict("No upload in progress".to_string()))?;
        let snapshot = SessionSnapshot::new(self.context.actor_id.clone(), payload);
        self.services.progress.save(&snapshot)?;

        if next.step != self.state.step {
            info!(upload = %snapshot.upload_id, from = %self.state.step, to = %next.step, "step changed");
        }
        self.state = next;
        self.last_autosave = Some(Instant::now());
        Ok(())
    }

    fn ingest(&self, result: ExtractionResult) -> Vec<Table> {
        result
            .tables
            .into_iter()
            .map(|raw| {
                if raw.was_coerced() {
                    warn!(issues = ?raw.issues, "coerced malformed extraction table");
                }
                let mut table = raw.into_table();
                if self.config.auto_detect_summary_rows {
                    table.summary_rows.extend(self.classifier.detect(&table.rows));
                }
                table
            })
            .collect()
    }

    fn load_tables(&mut self, tables: Vec<Table>, method: &str) {
        let best = best_table(&tables);
        self.state.store.replace_all(tables);
        if let Some(best) = best {
            if let Err(err) = self.state.store.select_table(best) {
                debug!(index = best, error = %err, "could not select best table");
            }
        }
        if let Some(upload) = self.state.upload.as_mut() {
            upload.extraction_method = Some(method.to_string());
        }
    }

    fn find_learned(&self, header: &[String]) -> Option<LearnedMapping> {
        let signature = structural_signature(header);
        match self.services.learning.find_learned_mapping(header, &signature) {
            Ok(found) => found.filter(|l| !l.mapping.is_empty()),
            Err(err) => {
                warn!(error = %err, "learned mapping lookup failed");
                None
            }
        }
    }

    fn remember_mapping(&self) {
        let Some(table) = self.state.store.selected_table() else {
            return;
        };
        let learned = LearnedMapping {
            mapping: self.state.mapping.clone(),
            field_config: self.state.field_config.clone(),
            plan_types: self.state.plan_types.clone(),
            table_names: self
                .state
                .store
                .tables()
                .iter()
                .filter_map(|t| t.name.clone())
                .collect(),
            confidence: None,
        };
        let signature = structural_signature(&table.header);
        if let Err(err) = self
            .services
            .learning
            .save_learned_mapping(&table.header, &signature, &learned)
        {
            warn!(error = %err, "failed to save learned mapping");
        }
    }

    fn build_request(&self) -> Result<ApprovalRequest> {
        let upload = self.current_upload()?;
        Ok(ApprovalRequest {
            upload_id: upload.id.clone(),
            actor_id: self.context.actor_id.clone(),
            environment_id: upload.environment_id.clone(),
            statement_date: self.state.statement_date,
            carrier: self.state.carrier.clone(),
            plan_types: self.state.plan_types.clone(),
            field_config: self.state.field_config.clone(),
            final_data: self
                .state
                .final_data
                .clone()
                .unwrap_or_else(|| self.state.store.to_tables()),
            skipped: self.state.skipped,
        })
    }

    fn approval_request(&self, action: &str) -> Result<ApprovalRequest> {
        self.require(&[WorkflowStep::Dashboard], action)?;
        let required = self.config.approval;
        if required.statement_date && self.state.statement_date.is_none() {
            return Err(TallyError::StateConflict(format!(
                "Select a statement date before you {}",
                action
            )));
        }
        if required.carrier && self.state.carrier.is_none() {
            return Err(TallyError::StateConflict(format!(
                "Set a carrier before you {}",
                action
            )));
        }
        self.build_request()
    }

    fn complete(&mut self, status: CompletionStatus) -> StepOutcome {
        let step = WorkflowStep::Completed(status);
        info!(upload = %self.upload_id(), step = %step, "review completed");
        if let Err(err) = self.services.progress.discard(self.upload_id()) {
            warn!(error = %err, upload = %self.upload_id(), "failed to discard session snapshot");
        }
        self.state.step = step;
        StepOutcome::new(step, step.label())
    }
}
