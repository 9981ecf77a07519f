//! Heuristic classification of aggregate rows.

use serde::{Deserialize, Serialize};

use crate::config::ReviewConfig;

use super::patterns::{contains_keyword, find_keyword, matches_exact_pattern, parse_amount};

/// Cells scanned for a summary keyword.
const KEYWORD_CELLS: std::ops::Range<usize> = 0..3;

/// Cells scanned for a numeric value.
const NUMERIC_CELLS: std::ops::RangeInclusive<usize> = 3..=6;

/// Literal checked last, independently of the templates.
const GROUP_LITERAL: &str = "total for group";

/// Which detection rule flagged a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SummaryMatch {
    /// The first cell matches an aggregate template.
    ExactPattern,
    /// A keyword appears in one of the first three cells alongside a number.
    KeywordNumeric {
        /// Lowercased keyword that matched.
        keyword: String,
        /// Cell the keyword was found in.
        cell: usize,
    },
    /// The first cell contains "total for group".
    GroupLiteral,
}

impl SummaryMatch {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            SummaryMatch::ExactPattern => "Matches a total template",
            SummaryMatch::KeywordNumeric { .. } => "Summary keyword with amount",
            SummaryMatch::GroupLiteral => "Group total line",
        }
    }
}

/// Detects subtotal, group-total and grand-total rows.
#[derive(Debug, Clone)]
pub struct SummaryRowClassifier {
    similarity_threshold: f64,
}

impl SummaryRowClassifier {
    /// Create a classifier with the default similarity threshold (0.7).
    pub fn new() -> Self {
        Self {
            similarity_threshold: 0.7,
        }
    }

    /// Create a classifier using the session configuration.
    pub fn from_config(config: &ReviewConfig) -> Self {
        Self::new().with_similarity_threshold(config.similarity_threshold)
    }

    /// Set the minimum similarity ratio for [`find_similar_rows`](Self::find_similar_rows).
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Classify a row. The first matching rule wins.
    pub fn classify(&self, row: &[String]) -> Option<SummaryMatch> {
        let first = row.first().map(|s| s.trim()).unwrap_or("");

        if matches_exact_pattern(first) {
            return Some(SummaryMatch::ExactPattern);
        }

        if let Some((keyword, cell)) = keyword_cell(row) {
            if has_numeric_cell(row) {
                return Some(SummaryMatch::KeywordNumeric { keyword, cell });
            }
        }

        if first.to_lowercase().contains(GROUP_LITERAL) {
            return Some(SummaryMatch::GroupLiteral);
        }

        None
    }

    /// Whether a row looks like an aggregate.
    pub fn is_summary(&self, row: &[String]) -> bool {
        self.classify(row).is_some()
    }

    /// Indices of every row that classifies as a summary row.
    pub fn detect(&self, rows: &[Vec<String>]) -> Vec<usize> {
        rows.iter()
            .enumerate()
            .filter(|(_, row)| self.is_summary(row))
            .map(|(i, _)| i)
            .collect()
    }

    /// Find rows that resemble the row at `reference`.
    ///
    /// When the reference row was flagged by keyword and amount, rows whose
    /// same cell carries the same keyword are returned. Otherwise every other
    /// row of equal width whose per-cell similarity reaches the threshold is
    /// returned. The reference itself is never included.
    pub fn find_similar_rows(&self, rows: &[Vec<String>], reference: usize) -> Vec<usize> {
        let Some(target) = rows.get(reference) else {
            return Vec::new();
        };

        if let Some(SummaryMatch::KeywordNumeric { keyword, cell }) = self.classify(target) {
            return rows
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != reference)
                .filter(|(_, row)| {
                    row.get(cell)
                        .is_some_and(|text| contains_keyword(text, &keyword))
                })
                .map(|(i, _)| i)
                .collect();
        }

        rows.iter()
            .enumerate()
            .filter(|(i, _)| *i != reference)
            .filter(|(_, row)| {
                row_similarity(target, row).is_some_and(|ratio| ratio >= self.similarity_threshold)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

impl Default for SummaryRowClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of cells that are equal after trimming, ignoring case.
///
/// Returns `None` when the rows differ in width or are empty.
pub fn row_similarity(a: &[String], b: &[String]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let equal = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.trim().to_lowercase() == y.trim().to_lowercase())
        .count();

    Some(equal as f64 / a.len() as f64)
}

fn keyword_cell(row: &[String]) -> Option<(String, usize)> {
    KEYWORD_CELLS
        .filter_map(|i| row.get(i).map(|text| (i, text)))
        .find_map(|(i, text)| find_keyword(text).map(|k| (k, i)))
}

fn has_numeric_cell(row: &[String]) -> bool {
    NUMERIC_CELLS
        .filter_map(|i| row.get(i))
        .any(|text| parse_amount(text).is_some())
}
