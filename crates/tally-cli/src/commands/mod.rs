//! CLI command implementations.

pub mod classify;
pub mod decide;
pub mod export;
pub mod ingest;
pub mod map;
pub mod status;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tally::session::{FileProgressStore, JsonFileExtractor, Services, SessionContext};
use tally::{ReviewConfig, SessionController, StepOutcome};

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Options shared by every command.
pub struct Env {
    store: Arc<FileProgressStore>,
    config: Option<PathBuf>,
    actor: String,
}

impl Env {
    pub fn new(store: PathBuf, config: Option<PathBuf>, actor: String) -> Self {
        Self {
            store: Arc::new(FileProgressStore::new(store)),
            config,
            actor,
        }
    }

    /// The file store.
    pub fn store(&self) -> &FileProgressStore {
        &self.store
    }

    /// The review configuration from `--config`, or the defaults.
    pub fn config(&self) -> Result<ReviewConfig, Box<dyn Error>> {
        Ok(match &self.config {
            Some(path) => ReviewConfig::load(path)?,
            None => ReviewConfig::default(),
        })
    }

    /// A controller in the upload step.
    pub fn controller(&self, environment: Option<String>) -> Result<SessionController, Box<dyn Error>> {
        let config = self.config()?;
        let mut context = SessionContext::new(self.actor.clone());
        if let Some(environment) = environment {
            context = context.with_environment(environment);
        }
        let services = Services::new(
            Arc::new(JsonFileExtractor::new()),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
        );
        Ok(SessionController::new(config, context, services))
    }

    /// A controller resumed at the saved step of an upload.
    pub fn resume(&self, upload_id: &str) -> Result<SessionController, Box<dyn Error>> {
        let mut session = self.controller(None)?;
        let outcome = session.resume(upload_id)?;
        tracing::debug!(upload = upload_id, step = %outcome.step, "resumed");
        Ok(session)
    }
}

/// Print what an operation did.
pub fn print_outcome(outcome: &StepOutcome) {
    println!(
        "{} {} {}",
        "→".cyan(),
        outcome.step.label().white().bold(),
        format!("({})", outcome.notice).dimmed()
    );
}
