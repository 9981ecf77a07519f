//! Configuration for a review session.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// Thresholds separating the high/medium/low confidence bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// Minimum confidence for the high band.
    pub high: f64,
    /// Minimum confidence for the medium band.
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.6,
        }
    }
}

/// Fields that must be filled in before a document can be approved or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirements {
    /// A statement date must be selected.
    pub statement_date: bool,
    /// A carrier must be set.
    pub carrier: bool,
}

impl Default for ApprovalRequirements {
    fn default() -> Self {
        Self {
            statement_date: true,
            carrier: true,
        }
    }
}

/// Configuration for a review session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Seconds between autosave attempts.
    pub autosave_interval_secs: u64,

    /// Minimum per-cell equality ratio for two rows to count as similar.
    pub similarity_threshold: f64,

    /// Confidence band boundaries for mapping suggestions.
    pub confidence: ConfidenceThresholds,

    /// Maximum number of undo snapshots kept per table.
    pub undo_depth: usize,

    /// Run summary-row detection when an extraction result arrives.
    pub auto_detect_summary_rows: bool,

    /// Preconditions for approve/reject.
    pub approval: ApprovalRequirements,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 30,
            similarity_threshold: 0.7,
            confidence: ConfidenceThresholds::default(),
            undo_depth: 50,
            auto_detect_summary_rows: true,
            approval: ApprovalRequirements::default(),
        }
    }
}

impl ReviewConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TallyError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ReviewConfig = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TallyError::Config(format!("Failed to parse '{}': {}", path.display(), e))
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Check that thresholds are within range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(TallyError::Config(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }
        if self.confidence.medium > self.confidence.high {
            return Err(TallyError::Config(
                "confidence.medium must not exceed confidence.high".to_string(),
            ));
        }
        Ok(())
    }

    /// Autosave interval as a duration.
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// Set the autosave interval.
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval_secs = interval.as_secs();
        self
    }

    /// Set the similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the undo depth.
    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    /// Set the approval requirements.
    pub fn with_approval(mut self, approval: ApprovalRequirements) -> Self {
        self.approval = approval;
        self
    }

    /// Enable or disable summary-row detection on ingest.
    pub fn with_auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect_summary_rows = enabled;
        self
    }
}
