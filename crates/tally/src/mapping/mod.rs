//! Mapping extracted columns onto canonical schema fields.
//!
//! A reviewer accepts [`MappingSuggestion`]s (grouped by confidence band)
//! into a [`FieldMapping`], which [`FieldMappingTransformer`] then applies to
//! every table of the document. Skipping the mapping passes tables through
//! with a field configuration generated from their own headers.

mod field;
mod scoring;
mod suggestion;
mod transformer;

pub use field::{FieldDescriptor, FieldMapping};
pub use scoring::{best_table, score_table, TableScore};
pub use suggestion::{
    accept_band, accept_high_band, accepted_mapping, group_by_confidence, suggest_from_header,
    ConfidenceBand, ConfidenceGroups, MappingSuggestion,
};
pub use transformer::{
    structural_signature, to_records, CanonicalRecord, FieldMappingTransformer, MappingValidation,
};
