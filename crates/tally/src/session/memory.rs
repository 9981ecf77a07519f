//! In-process service implementations for tests and demos.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

use super::services::{
    ActiveSession, ApprovalRequest, ApprovalService, ExtractionRequest, ExtractionResult,
    ExtractionService, LearnedMapping, MappingLearningService, ProgressService,
};
use super::snapshot::SessionSnapshot;
use super::step::WorkflowStep;

/// Which collaborator a failure is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Extraction,
    Learning,
    Progress,
    Approval,
}

impl ServiceKind {
    fn name(&self) -> &'static str {
        match self {
            ServiceKind::Extraction => "extraction",
            ServiceKind::Learning => "mapping-learning",
            ServiceKind::Progress => "progress",
            ServiceKind::Approval => "approval",
        }
    }
}

/// A recorded approval-service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalRecord {
    Approved { request: ApprovalRequest },
    Rejected { request: ApprovalRequest, reason: String },
    Pending { request: ApprovalRequest },
}

impl ApprovalRecord {
    /// The request that was sent.
    pub fn request(&self) -> &ApprovalRequest {
        match self {
            ApprovalRecord::Approved { request }
            | ApprovalRecord::Rejected { request, .. }
            | ApprovalRecord::Pending { request } => request,
        }
    }

    /// Upload the record belongs to.
    pub fn upload_id(&self) -> &str {
        &self.request().upload_id
    }
}

/// Deterministic in-memory backend implementing every service.
///
/// Extraction returns queued results in order. Any role can be made to fail
/// with [`fail`](Self::fail) until [`recover`](Self::recover) is called.
#[derive(Debug, Default)]
pub struct InMemoryServices {
    extractions: Mutex<VecDeque<ExtractionResult>>,
    extraction_requests: Mutex<Vec<ExtractionRequest>>,
    learned: Mutex<HashMap<String, LearnedMapping>>,
    snapshots: Mutex<HashMap<String, Vec<SessionSnapshot>>>,
    approvals: Mutex<Vec<ApprovalRecord>>,
    failing: Mutex<HashSet<ServiceKind>>,
    saves: Mutex<usize>,
}

impl InMemoryServices {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next extraction call.
    pub fn queue_extraction(&self, result: ExtractionResult) {
        lock(&self.extractions).push_back(result);
    }

    /// Remember a mapping under a signature.
    pub fn learn(&self, signature: impl Into<String>, learned: LearnedMapping) {
        lock(&self.learned).insert(signature.into(), learned);
    }

    /// Make every call to a role fail with a transient error.
    pub fn fail(&self, kind: ServiceKind) {
        lock(&self.failing).insert(kind);
    }

    /// Stop injecting failures into a role.
    pub fn recover(&self, kind: ServiceKind) {
        lock(&self.failing).remove(&kind);
    }

    /// Extraction requests received so far.
    pub fn extraction_requests(&self) -> Vec<ExtractionRequest> {
        lock(&self.extraction_requests).clone()
    }

    /// Approval calls received so far.
    pub fn approvals(&self) -> Vec<ApprovalRecord> {
        lock(&self.approvals).clone()
    }

    /// Learned mapping stored under a signature.
    pub fn learned(&self, signature: &str) -> Option<LearnedMapping> {
        lock(&self.learned).get(signature).cloned()
    }

    /// Number of successful progress saves.
    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }

    /// Every stored snapshot of an upload, oldest first.
    pub fn snapshots(&self, upload_id: &str) -> Vec<SessionSnapshot> {
        lock(&self.snapshots).get(upload_id).cloned().unwrap_or_default()
    }

    fn check(&self, kind: ServiceKind) -> Result<()> {
        if lock(&self.failing).contains(&kind) {
            return Err(TallyError::service(kind.name(), "injected failure"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ExtractionService for InMemoryServices {
    fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        self.check(ServiceKind::Extraction)?;
        lock(&self.extraction_requests).push(request.clone());
        lock(&self.extractions)
            .pop_front()
            .ok_or_else(|| TallyError::service("extraction", "no extraction result queued"))
    }
}

impl MappingLearningService for InMemoryServices {
    fn find_learned_mapping(&self, _header: &[String], signature: &str) -> Result<Option<LearnedMapping>> {
        self.check(ServiceKind::Learning)?;
        Ok(lock(&self.learned).get(signature).cloned())
    }

    fn save_learned_mapping(&self, _header: &[String], signature: &str, learned: &LearnedMapping) -> Result<()> {
        self.check(ServiceKind::Learning)?;
        lock(&self.learned).insert(signature.to_string(), learned.clone());
        Ok(())
    }
}

impl ProgressService for InMemoryServices {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.check(ServiceKind::Progress)?;
        let mut snapshots = lock(&self.snapshots);
        let entries = snapshots.entry(snapshot.upload_id.clone()).or_default();
        entries.retain(|s| s.step != snapshot.step);
        entries.push(snapshot.clone());
        *lock(&self.saves) += 1;
        Ok(())
    }

    fn load(&self, upload_id: &str, step: Option<WorkflowStep>) -> Result<Option<SessionSnapshot>> {
        self.check(ServiceKind::Progress)?;
        let snapshots = lock(&self.snapshots);
        let Some(entries) = snapshots.get(upload_id) else {
            return Ok(None);
        };
        let found = match step {
            Some(step) => entries.iter().find(|s| s.step == step),
            None => entries.last(),
        };
        Ok(found.cloned())
    }

    fn resume_active(&self, actor_id: &str) -> Result<Option<ActiveSession>> {
        self.check(ServiceKind::Progress)?;
        let snapshots = lock(&self.snapshots);
        Ok(snapshots
            .values()
            .filter_map(|entries| entries.last())
            .filter(|s| s.actor_id == actor_id && !s.step.is_terminal())
            .max_by_key(|s| s.saved_at)
            .map(|s| ActiveSession {
                upload_id: s.upload_id.clone(),
                step: s.step,
                saved_at: s.saved_at,
            }))
    }

    fn discard(&self, upload_id: &str) -> Result<()> {
        self.check(ServiceKind::Progress)?;
        lock(&self.snapshots).remove(upload_id);
        Ok(())
    }
}

impl ApprovalService for InMemoryServices {
    fn approve(&self, request: &ApprovalRequest) -> Result<()> {
        self.check(ServiceKind::Approval)?;
        lock(&self.approvals).push(ApprovalRecord::Approved {
            request: request.clone(),
        });
        Ok(())
    }

    fn reject(&self, request: &ApprovalRequest, reason: &str) -> Result<()> {
        self.check(ServiceKind::Approval)?;
        lock(&self.approvals).push(ApprovalRecord::Rejected {
            request: request.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn send_to_pending(&self, request: &ApprovalRequest) -> Result<()> {
        self.check(ServiceKind::Approval)?;
        lock(&self.approvals).push(ApprovalRecord::Pending {
            request: request.clone(),
        });
        Ok(())
    }
}
