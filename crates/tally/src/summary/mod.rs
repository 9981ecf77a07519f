//! Detection of aggregate ("total") rows in extracted tables.
//!
//! Statement tables interleave line items with subtotal, group-total and
//! grand-total lines. The classifier flags those rows so they can be shown
//! apart from line items and left out of line-level sums.
//!
//! Reviewer decisions always win: automatic detection only adds rows to a
//! table's summary set and never re-adds a row the reviewer unmarked (see
//! [`TableStore::auto_detect_summary_rows`](crate::table::TableStore::auto_detect_summary_rows)).

mod classifier;
mod patterns;

pub use classifier::{row_similarity, SummaryMatch, SummaryRowClassifier};
pub use patterns::{parse_amount, SUMMARY_KEYWORDS};
