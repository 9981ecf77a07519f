//! History of extraction attempts for one document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table::Table;

/// One run of the extraction service and the tables it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    /// Extraction method that produced the tables.
    pub method: String,

    /// The full table set of this attempt.
    pub tables: Vec<Table>,

    /// When the attempt was recorded.
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionAttempt {
    /// Create an attempt stamped with the current time.
    pub fn new(method: impl Into<String>, tables: Vec<Table>) -> Self {
        Self {
            method: method.into(),
            tables,
            extracted_at: Utc::now(),
        }
    }
}

/// Stack of extraction attempts with a cursor.
///
/// Navigation is one-way back: a new attempt is always placed directly after
/// the cursor, and any attempts that were after it become unreachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionHistory {
    attempts: Vec<ExtractionAttempt>,
    cursor: Option<usize>,
}

impl ExtractionHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new attempt after the cursor and move the cursor to it.
    pub fn push(&mut self, attempt: ExtractionAttempt) -> &ExtractionAttempt {
        let keep = self.cursor.map_or(0, |c| c + 1);
        if keep < self.attempts.len() {
            debug!(dropped = self.attempts.len() - keep, "truncating abandoned extraction attempts");
            self.attempts.truncate(keep);
        }
        self.attempts.push(attempt);
        let index = self.attempts.len() - 1;
        self.cursor = Some(index);
        &self.attempts[index]
    }

    /// Move the cursor back one attempt and return it.
    pub fn go_back(&mut self) -> Option<&ExtractionAttempt> {
        let cursor = self.cursor.filter(|&c| c > 0)?;
        self.cursor = Some(cursor - 1);
        self.attempts.get(cursor - 1)
    }

    /// Whether there is an earlier attempt to return to.
    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    /// The attempt at the cursor.
    pub fn current(&self) -> Option<&ExtractionAttempt> {
        self.cursor.and_then(|c| self.attempts.get(c))
    }

    /// Cursor position.
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// Number of stored attempts.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Whether no attempt has been recorded.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// All stored attempts, oldest first.
    pub fn attempts(&self) -> &[ExtractionAttempt] {
        &self.attempts
    }

    /// Forget every attempt.
    pub fn clear(&mut self) {
        self.attempts.clear();
        self.cursor = None;
    }
}
