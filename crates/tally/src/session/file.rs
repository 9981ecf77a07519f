//! File-backed services: JSON files under a store directory.
//!
//! ```text
//! .tally/
//! ├── sessions/<upload_id>.json     # snapshots per step
//! ├── decisions/<upload_id>.json    # approval outcomes
//! └── learned/<signature>.json      # learned mappings
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TallyError};

use super::memory::ApprovalRecord;
use super::services::{
    ActiveSession, ApprovalRequest, ApprovalService, ExtractionRequest, ExtractionResult,
    ExtractionService, LearnedMapping, MappingLearningService, ProgressService,
};
use super::snapshot::SessionSnapshot;
use super::step::WorkflowStep;

/// Snapshots of one upload, keyed by step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProgressRecord {
    /// Most recently saved first.
    snapshots: Vec<SessionSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LearnedRecord {
    header: Vec<String>,
    signature: String,
    learned: LearnedMapping,
}

/// Progress, approval and learned-mapping storage in a directory.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    /// Use `root` as the store directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Approval outcomes recorded for an upload, oldest first.
    pub fn decisions(&self, upload_id: &str) -> Result<Vec<ApprovalRecord>> {
        let path = self.entry_path("decisions", upload_id)?;
        Ok(read_json(&path)?.unwrap_or_default())
    }

    /// Upload ids with stored snapshots.
    pub fn uploads(&self) -> Result<Vec<String>> {
        let dir = self.root.join("sessions");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| TallyError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().map(|s| s.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn entry_path(&self, kind: &str, id: &str) -> Result<PathBuf> {
        if id.is_empty()
            || id.starts_with('.')
            || id.chars().any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
        {
            return Err(TallyError::Validation(format!(
                "'{}' cannot be used as a store key",
                id
            )));
        }
        Ok(self.root.join(kind).join(format!("{}.json", id)))
    }

    fn record(&self, upload_id: &str) -> Result<(PathBuf, ProgressRecord)> {
        let path = self.entry_path("sessions", upload_id)?;
        let record = read_json(&path)?.unwrap_or_default();
        Ok((path, record))
    }

    fn record_decision(&self, record: ApprovalRecord) -> Result<()> {
        let path = self.entry_path("decisions", record.upload_id())?;
        let mut records: Vec<ApprovalRecord> = read_json(&path)?.unwrap_or_default();
        records.push(record);
        write_json(&path, &records)
    }
}

impl ProgressService for FileProgressStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let (path, mut record) = self.record(&snapshot.upload_id)?;
        record.snapshots.retain(|s| s.step != snapshot.step);
        record.snapshots.insert(0, snapshot.clone());
        write_json(&path, &record)?;
        debug!(upload = %snapshot.upload_id, step = %snapshot.step, "saved session snapshot");
        Ok(())
    }

    fn load(&self, upload_id: &str, step: Option<WorkflowStep>) -> Result<Option<SessionSnapshot>> {
        let (_, record) = self.record(upload_id)?;
        Ok(match step {
            Some(step) => record.snapshots.into_iter().find(|s| s.step == step),
            None => record.snapshots.into_iter().next(),
        })
    }

    fn resume_active(&self, actor_id: &str) -> Result<Option<ActiveSession>> {
        let mut best: Option<ActiveSession> = None;
        for upload_id in self.uploads()? {
            let Some(latest) = self.load(&upload_id, None)? else {
                continue;
            };
            if latest.actor_id != actor_id || latest.step.is_terminal() {
                continue;
            }
            if best.as_ref().is_none_or(|b| latest.saved_at > b.saved_at) {
                best = Some(ActiveSession {
                    upload_id: latest.upload_id,
                    step: latest.step,
                    saved_at: latest.saved_at,
                });
            }
        }
        Ok(best)
    }

    fn discard(&self, upload_id: &str) -> Result<()> {
        let path = self.entry_path("sessions", upload_id)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| TallyError::Io { path, source: e })?;
        }
        Ok(())
    }
}

impl ApprovalService for FileProgressStore {
    fn approve(&self, request: &ApprovalRequest) -> Result<()> {
        self.record_decision(ApprovalRecord::Approved {
            request: request.clone(),
        })
    }

    fn reject(&self, request: &ApprovalRequest, reason: &str) -> Result<()> {
        self.record_decision(ApprovalRecord::Rejected {
            request: request.clone(),
            reason: reason.to_string(),
        })
    }

    fn send_to_pending(&self, request: &ApprovalRequest) -> Result<()> {
        self.record_decision(ApprovalRecord::Pending {
            request: request.clone(),
        })
    }
}

impl MappingLearningService for FileProgressStore {
    fn find_learned_mapping(&self, _header: &[String], signature: &str) -> Result<Option<LearnedMapping>> {
        let path = self.entry_path("learned", &signature_key(signature))?;
        let record: Option<LearnedRecord> = read_json(&path)?;
        Ok(record.map(|r| r.learned))
    }

    fn save_learned_mapping(&self, header: &[String], signature: &str, learned: &LearnedMapping) -> Result<()> {
        let path = self.entry_path("learned", &signature_key(signature))?;
        write_json(
            &path,
            &LearnedRecord {
                header: header.to_vec(),
                signature: signature.to_string(),
                learned: learned.clone(),
            },
        )
    }
}

/// Extraction from pre-extracted JSON: the upload's file reference is read
/// as an [`ExtractionResult`] document.
#[derive(Debug, Clone, Default)]
pub struct JsonFileExtractor;

impl JsonFileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionService for JsonFileExtractor {
    fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        let path = PathBuf::from(&request.file);
        if !path.exists() {
            return Err(TallyError::service(
                "extraction",
                format!("'{}' does not exist", path.display()),
            ));
        }
        let file = File::open(&path).map_err(|e| TallyError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut result = ExtractionResult::from_reader(BufReader::new(file))?;
        if result.method.is_none() {
            result.method = Some(request.method.clone());
        }
        Ok(result)
    }
}

/// `sha256:abc…` → `sha256-abc…`
fn signature_key(signature: &str) -> String {
    signature.replace(':', "-")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).map_err(|e| {
        TallyError::Persistence(format!("Failed to open file '{}': {}", path.display(), e))
    })?;
    let value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        TallyError::Persistence(format!("Failed to parse '{}': {}", path.display(), e))
    })?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                TallyError::Persistence(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(path).map_err(|e| {
        TallyError::Persistence(format!("Failed to create file '{}': {}", path.display(), e))
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| TallyError::Persistence(format!("Failed to serialize '{}': {}", path.display(), e)))
}
