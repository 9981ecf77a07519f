//! Mapping suggestions, confidence bands and header-based suggestion.

use serde::{Deserialize, Serialize};

use crate::config::ConfidenceThresholds;

use super::field::{FieldDescriptor, FieldMapping};

/// Confidence band of a mapping suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Band for a confidence value.
    pub fn of(confidence: f64, thresholds: &ConfidenceThresholds) -> Self {
        if confidence >= thresholds.high {
            ConfidenceBand::High
        } else if confidence >= thresholds.medium {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "High confidence",
            ConfidenceBand::Medium => "Medium confidence",
            ConfidenceBand::Low => "Low confidence",
        }
    }
}

/// A proposed source column for one canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSuggestion {
    /// Canonical field key.
    pub field_key: String,

    /// Proposed source column name.
    pub source_column: String,

    /// Confidence in this suggestion (0.0-1.0).
    pub confidence: f64,

    /// Why this column was proposed.
    #[serde(default)]
    pub reasoning: String,

    /// Other plausible source columns, best first.
    #[serde(default)]
    pub alternatives: Vec<String>,

    /// Whether a reviewer should look at this before accepting.
    #[serde(default)]
    pub requires_review: bool,

    /// Whether the reviewer accepted it.
    #[serde(default)]
    pub accepted: bool,
}

impl MappingSuggestion {
    /// Create a new, unaccepted suggestion.
    pub fn new(field_key: impl Into<String>, source_column: impl Into<String>, confidence: f64) -> Self {
        Self {
            field_key: field_key.into(),
            source_column: source_column.into(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: String::new(),
            alternatives: Vec::new(),
            requires_review: false,
            accepted: false,
        }
    }

    /// Set the reasoning.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Set the alternatives.
    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }

    /// Set whether review is required.
    pub fn with_requires_review(mut self, requires_review: bool) -> Self {
        self.requires_review = requires_review;
        self
    }

    /// Band of this suggestion.
    pub fn band(&self, thresholds: &ConfidenceThresholds) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence, thresholds)
    }
}

/// Suggestions grouped by band, each band sorted for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceGroups {
    pub high: Vec<MappingSuggestion>,
    pub medium: Vec<MappingSuggestion>,
    pub low: Vec<MappingSuggestion>,
}

impl ConfidenceGroups {
    /// Suggestions in one band.
    pub fn band(&self, band: ConfidenceBand) -> &[MappingSuggestion] {
        match band {
            ConfidenceBand::High => &self.high,
            ConfidenceBand::Medium => &self.medium,
            ConfidenceBand::Low => &self.low,
        }
    }
}

/// Group suggestions into bands.
///
/// Within a band, accepted suggestions come after unaccepted ones; otherwise
/// the input order is kept.
pub fn group_by_confidence(
    suggestions: &[MappingSuggestion],
    thresholds: &ConfidenceThresholds,
) -> ConfidenceGroups {
    let mut groups = ConfidenceGroups::default();
    for suggestion in suggestions {
        let target = match suggestion.band(thresholds) {
            ConfidenceBand::High => &mut groups.high,
            ConfidenceBand::Medium => &mut groups.medium,
            ConfidenceBand::Low => &mut groups.low,
        };
        target.push(suggestion.clone());
    }

    // sort_by_key is stable
    for band in [&mut groups.high, &mut groups.medium, &mut groups.low] {
        band.sort_by_key(|s| s.accepted);
    }
    groups
}

/// Accept every suggestion in a band. Returns how many changed.
pub fn accept_band(
    suggestions: &mut [MappingSuggestion],
    band: ConfidenceBand,
    thresholds: &ConfidenceThresholds,
) -> usize {
    let mut changed = 0;
    for suggestion in suggestions.iter_mut() {
        if suggestion.band(thresholds) == band && !suggestion.accepted {
            suggestion.accepted = true;
            changed += 1;
        }
    }
    changed
}

/// Accept the whole high band in one action.
pub fn accept_high_band(suggestions: &mut [MappingSuggestion], thresholds: &ConfidenceThresholds) -> usize {
    accept_band(suggestions, ConfidenceBand::High, thresholds)
}

/// Build a mapping from the accepted suggestions, in suggestion order.
pub fn accepted_mapping(suggestions: &[MappingSuggestion]) -> FieldMapping {
    suggestions
        .iter()
        .filter(|s| s.accepted && !s.source_column.is_empty())
        .map(|s| (s.field_key.clone(), s.source_column.clone()))
        .collect()
}

/// Propose a source column for each field by comparing names.
///
/// Fields with no plausible column get no suggestion.
pub fn suggest_from_header(
    header: &[String],
    fields: &[FieldDescriptor],
    thresholds: &ConfidenceThresholds,
) -> Vec<MappingSuggestion> {
    let columns: Vec<(String, &String)> = header.iter().map(|h| (normalize(h), h)).collect();

    fields
        .iter()
        .filter_map(|field| {
            let key = normalize(&field.key);
            let label = normalize(&field.label);

            let mut scored: Vec<(f64, &str, &String)> = columns
                .iter()
                .filter(|(norm, _)| !norm.is_empty())
                .map(|(norm, original)| {
                    let (score, why) = better(name_score(norm, &key), name_score(norm, &label));
                    (score, why, *original)
                })
                .filter(|(score, _, _)| *score > 0.0)
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));

            let (confidence, why, column) = scored.first().copied()?;
            let alternatives = scored.iter().skip(1).take(2).map(|(_, _, c)| (*c).clone()).collect();

            Some(
                MappingSuggestion::new(&field.key, column.clone(), confidence)
                    .with_reasoning(format!("Column '{}' {} field '{}'", column, why, field.label))
                    .with_alternatives(alternatives)
                    .with_requires_review(confidence < thresholds.high),
            )
        })
        .collect()
}

fn better(a: (f64, &'static str), b: (f64, &'static str)) -> (f64, &'static str) {
    if b.0 > a.0 { b } else { a }
}

fn name_score(column: &str, field: &str) -> (f64, &'static str) {
    if field.is_empty() {
        return (0.0, "");
    }
    if column == field {
        return (0.95, "matches");
    }
    if column.contains(field) || field.contains(column) {
        return (0.75, "contains");
    }

    let a: Vec<&str> = column.split(' ').collect();
    let b: Vec<&str> = field.split(' ').collect();
    let shared = a.iter().filter(|t| b.contains(t)).count();
    if shared == 0 {
        return (0.0, "");
    }
    let union = a.len() + b.len() - shared;
    (0.6 * shared as f64 / union as f64, "shares words with")
}

/// Lowercase, with runs of non-alphanumerics collapsed to single spaces.
fn normalize(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<MappingSuggestion> {
        vec![
            MappingSuggestion::new("agent_name", "Agent", 0.95),
            MappingSuggestion::new("region", "Region", 0.7),
            MappingSuggestion::new("plan", "Col 3", 0.4),
        ]
    }

    #[test]
    fn test_band_boundaries() {
        let t = ConfidenceThresholds::default();
        assert_eq!(ConfidenceBand::of(0.8, &t), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::of(0.79, &t), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::of(0.6, &t), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::of(0.59, &t), ConfidenceBand::Low);
    }

    #[test]
    fn test_group_by_confidence() {
        let groups = group_by_confidence(&sample(), &ConfidenceThresholds::default());
        assert_eq!(groups.high.len(), 1);
        assert_eq!(groups.high[0].confidence, 0.95);
        assert_eq!(groups.medium[0].confidence, 0.7);
        assert_eq!(groups.low[0].confidence, 0.4);
    }

    #[test]
    fn test_accepted_sort_last_within_band() {
        let t = ConfidenceThresholds::default();
        let mut suggestions = vec![
            MappingSuggestion::new("a", "A", 0.95),
            MappingSuggestion::new("b", "B", 0.9),
            MappingSuggestion::new("c", "C", 0.85),
        ];
        suggestions[0].accepted = true;

        let groups = group_by_confidence(&suggestions, &t);
        let keys: Vec<&str> = groups.high.iter().map(|s| s.field_key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_accept_high_band() {
        let t = ConfidenceThresholds::default();
        let mut suggestions = sample();
        assert_eq!(accept_high_band(&mut suggestions, &t), 1);
        assert_eq!(accept_high_band(&mut suggestions, &t), 0);

        let mapping = accepted_mapping(&suggestions);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.source_for("agent_name"), Some("Agent"));
    }

    #[test]
    fn test_suggest_from_header() {
        let header: Vec<String> = ["Agent Name", "Region", "Comm. Amount"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fields = vec![
            FieldDescriptor::new("agent_name", "Agent"),
            FieldDescriptor::new("commission", "Commission Amount"),
            FieldDescriptor::new("policy", "Policy Number"),
        ];

        let suggestions = suggest_from_header(&header, &fields, &ConfidenceThresholds::default());
        assert_eq!(suggestions.len(), 2);

        assert_eq!(suggestions[0].source_column, "Agent Name");
        assert_eq!(suggestions[0].confidence, 0.95);
        assert!(!suggestions[0].requires_review);

        assert_eq!(suggestions[1].source_column, "Comm. Amount");
        assert!(suggestions[1].requires_review);
    }
}
