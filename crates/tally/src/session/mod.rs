//! Review sessions: the workflow state machine and its collaborators.
//!
//! A [`SessionController`] walks one upload through
//! `upload → table_editor → field_mapper → dashboard → approved | rejected`,
//! with `pending` as a resumable side exit. Progress is persisted through a
//! [`ProgressService`] on every step change and on autosave, and can be
//! resumed from the last snapshot.
//!
//! Backends:
//!
//! - [`InMemoryServices`] for tests and demos
//! - [`FileProgressStore`] and [`JsonFileExtractor`] for local use
//! - [`HttpBackend`] for a remote review API

mod context;
mod controller;
mod file;
mod http;
mod memory;
mod services;
mod snapshot;
mod step;

pub use context::{SessionContext, Upload};
pub use controller::{SessionController, StepOutcome};
pub use file::{FileProgressStore, JsonFileExtractor};
pub use http::HttpBackend;
pub use memory::{ApprovalRecord, InMemoryServices, ServiceKind};
pub use services::{
    ActiveSession, ApprovalRequest, ApprovalService, ExtractionRequest, ExtractionResult,
    ExtractionService, LearnedMapping, MappingLearningService, ProgressService, Services,
};
pub use snapshot::{SessionSnapshot, SnapshotPayload};
pub use step::{CompletionStatus, WorkflowStep};
