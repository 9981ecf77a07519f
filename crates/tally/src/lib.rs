//! Tally: reviewer workflow for machine-extracted statement tables.
//!
//! Tables extracted from scanned financial statements are rarely right the
//! first time. Tally gives a reviewer the tools to fix them and commit the
//! result: table editing with undo, detection of subtotal and grand-total
//! rows, mapping of extracted columns onto canonical fields, and a resumable,
//! autosaved workflow that ends in approval or rejection.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tally::session::{FileProgressStore, JsonFileExtractor, Services, SessionContext, Upload};
//! use tally::{ReviewConfig, SessionController};
//!
//! let store = Arc::new(FileProgressStore::new(".tally"));
//! let services = Services::new(
//!     Arc::new(JsonFileExtractor::new()),
//!     store.clone(),
//!     store.clone(),
//!     store,
//! );
//!
//! let mut session = SessionController::new(
//!     ReviewConfig::default(),
//!     SessionContext::new("jane@example.com"),
//!     services,
//! );
//! let outcome = session
//!     .start_extraction(Upload::new("stmt-001", "stmt-001.json"), None)
//!     .unwrap();
//! println!("{}: {}", outcome.step, outcome.notice);
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod mapping;
pub mod session;
pub mod summary;
pub mod table;

pub use config::{ApprovalRequirements, ConfidenceThresholds, ReviewConfig};
pub use error::{Result, TallyError};
pub use history::{ExtractionAttempt, ExtractionHistory};
pub use mapping::{FieldDescriptor, FieldMapping, FieldMappingTransformer, MappingSuggestion};
pub use session::{SessionController, StepOutcome, WorkflowStep};
pub use summary::{SummaryMatch, SummaryRowClassifier};
pub use table::{RawTable, Table, TableStore};
