//! Text patterns used to recognise aggregate rows.

use std::cmp::Reverse;

use once_cell::sync::Lazy;
use regex::Regex;

/// Words that mark a row as an aggregate when paired with a numeric cell.
pub const SUMMARY_KEYWORDS: &[&str] = &[
    "total",
    "subtotal",
    "summary",
    "group",
    "grand",
    "sum",
    "count",
    "amount",
    "balance",
    "net",
    "final",
    "overall",
    "combined",
    "aggregate",
];

/// Whole-cell templates for the first cell of an aggregate row.
static EXACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // total / subtotal / summary / grand total / group total, optional ": label"
        r"(?i)^(?:grand\s+total|group\s+total|sub\s*-?\s*total|total|summary)(?:\s*:\s*.*)?$",
        // total for group: label
        r"(?i)^total\s+for\s+group\s*:\s*.+$",
        // label total
        r"(?i)^.+\s+total$",
        // total label
        r"(?i)^total\s+.+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("summary pattern must compile"))
    .collect()
});

static AMOUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{1,3}(?:,\d{3})+|\d+)?(?:\.\d+)?$").expect("amount pattern"));

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Whether the trimmed text matches one of the aggregate templates.
pub fn matches_exact_pattern(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && EXACT_PATTERNS.iter().any(|re| re.is_match(text))
}

/// The leftmost summary keyword contained in `text`, lowercased.
///
/// Matching is a case-insensitive substring test, so `Subtotals` and
/// `TotalCommission` both match. When two keywords start at the same
/// position the longer one wins (`summary` over `sum`).
pub fn find_keyword(text: &str) -> Option<String> {
    let text = text.to_lowercase();
    SUMMARY_KEYWORDS
        .iter()
        .filter_map(|kw| text.find(kw).map(|pos| (pos, *kw)))
        .min_by_key(|(pos, kw)| (*pos, Reverse(kw.len())))
        .map(|(_, kw)| kw.to_string())
}

/// Whether `text` contains the given keyword, ignoring case.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.to_lowercase().contains(&keyword.to_lowercase())
}

/// Parse a bare or currency-formatted number.
///
/// Accepts an optional sign or accounting parentheses, a currency symbol,
/// thousands separators and decimals: `1,234.56`, `$-12`, `(45.00)`, `€ 3`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let mut s = text.trim();
    let mut negative = false;

    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].trim();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_prefix(CURRENCY_SYMBOLS) {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim_start();
    }

    if s.is_empty() || s == "." || !AMOUNT_PATTERN.is_match(s) {
        return None;
    }

    let value: f64 = s.replace(',', "").parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_patterns() {
        for text in [
            "Total",
            "total: West",
            "Subtotal",
            "Sub-Total: Q1",
            "SUMMARY",
            "Grand Total",
            "group total: Alpha",
            "Region Total",
            "Total Commissions",
            "Total for group: Alpha",
            "  total  ",
        ] {
            assert!(matches_exact_pattern(text), "expected match for {:?}", text);
        }

        for text in ["", "John Smith", "Totally Fine Co.", "Subtotals pending"] {
            assert!(!matches_exact_pattern(text), "unexpected match for {:?}", text);
        }
    }

    #[test]
    fn test_find_keyword_substring() {
        assert_eq!(find_keyword("Net Premium"), Some("net".to_string()));
        assert_eq!(find_keyword("Subtotals"), Some("subtotal".to_string()));
        assert_eq!(find_keyword("TotalCommission"), Some("total".to_string()));
        assert_eq!(find_keyword("Summary of fees"), Some("summary".to_string()));
        assert_eq!(find_keyword("Account Manager"), Some("count".to_string()));
        assert_eq!(find_keyword("John Smith"), None);
        assert!(contains_keyword("Group B", "group"));
        assert!(contains_keyword("SUBGROUP", "group"));
        assert!(!contains_keyword("Group B", "net"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("500"), Some(500.0));
        assert_eq!(parse_amount("$1,000"), Some(1000.0));
        assert_eq!(parse_amount("(45.00)"), Some(-45.0));
        assert_eq!(parse_amount("-$12.5"), Some(-12.5));
        assert_eq!(parse_amount("$-12.5"), Some(-12.5));
        assert_eq!(parse_amount(".75"), Some(0.75));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("CA"), None);
        assert_eq!(parse_amount("12,34"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }
}
