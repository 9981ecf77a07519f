//! Integration tests for table editing, summary rows and field mapping.

use std::collections::BTreeSet;

use tally::mapping::{to_records, FieldDescriptor, FieldMapping, FieldMappingTransformer};
use tally::{SummaryRowClassifier, Table, TableStore, TallyError};

fn s(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// A table with `rows` rows whose first cell is the row number.
fn numbered_table(rows: usize) -> Table {
    Table::new(
        s(&["No", "Amount"]),
        (0..rows).map(|i| vec![i.to_string(), format!("{}.00", i)]).collect(),
    )
}

fn statement() -> Table {
    Table::new(
        s(&["Agent", "Group", "Plan", "Premium", "Rate", "Commission"]),
        vec![
            s(&["Alice", "G1", "Medical", "1,000.00", "10%", "100.00"]),
            s(&["Bob", "G1", "Dental", "500.00", "10%", "50.00"]),
            s(&["", "Group total", "", "1,500.00", "", "150.00"]),
            s(&["Cara", "G2", "Medical", "800.00", "10%", "80.00"]),
            s(&["", "Group total", "", "800.00", "", "80.00"]),
            s(&["Grand Total", "", "", "2,300.00", "", "230.00"]),
        ],
    )
}

// =============================================================================
// Row deletion and summary re-indexing
// =============================================================================

#[test]
fn test_bulk_delete_reindexes_summary_rows() {
    let mut store = TableStore::new(vec![numbered_table(10).with_summary_rows([2, 4, 6, 8])]);

    assert_eq!(store.delete_rows(&[1, 3, 5]).unwrap(), 3);

    let table = store.selected_table().unwrap();
    assert_eq!(table.row_count(), 7);
    assert_eq!(table.summary_rows, BTreeSet::from([1, 2, 3, 5]));
    // Remaining rows keep their order
    let firsts: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(firsts, vec!["0", "2", "4", "6", "7", "8", "9"]);
}

#[test]
fn test_deleting_a_summary_row_unflags_it() {
    let mut store = TableStore::new(vec![numbered_table(5).with_summary_rows([1, 3])]);
    store.delete_row(1).unwrap();
    assert_eq!(store.selected_table().unwrap().summary_rows, BTreeSet::from([2]));
}

#[test]
fn test_delete_selected_rows() {
    let mut store = TableStore::new(vec![numbered_table(6)]);
    store.toggle_row(0).unwrap();
    store.toggle_row(4).unwrap();
    assert!(store.is_indeterminate());

    assert_eq!(store.delete_selected().unwrap(), 2);
    assert!(store.selected_rows().is_empty());
    assert_eq!(store.selected_table().unwrap().row_count(), 4);
}

#[test]
fn test_out_of_range_edits_are_rejected() {
    let mut store = TableStore::new(vec![numbered_table(2)]);
    assert!(matches!(store.delete_row(5), Err(TallyError::Validation(_))));
    assert!(matches!(store.edit_cell(0, 9, "x"), Err(TallyError::Validation(_))));
    assert!(matches!(store.rename_column(0, " "), Err(TallyError::Validation(_))));
    // Rejected edits leave nothing to undo
    assert!(!store.can_undo());
}

// =============================================================================
// Columns and undo
// =============================================================================

#[test]
fn test_column_edits_keep_rows_rectangular() {
    let mut store = TableStore::new(vec![numbered_table(3)]);
    let at = store.add_column(1, Some("Note".to_string())).unwrap();
    assert_eq!(at, 1);
    store.edit_cell(2, 1, "late").unwrap();
    store.delete_column(0).unwrap();

    let table = store.selected_table().unwrap();
    assert_eq!(table.header, s(&["Note", "Amount"]));
    assert!(table.is_consistent());
    assert_eq!(table.get(2, 0), Some("late"));
}

#[test]
fn test_undo_and_redo_edits() {
    let mut store = TableStore::new(vec![numbered_table(3)]);
    store.edit_cell(0, 1, "9.99").unwrap();
    store.delete_row(2).unwrap();

    assert!(store.undo().unwrap());
    assert_eq!(store.selected_table().unwrap().row_count(), 3);
    assert!(store.undo().unwrap());
    assert_eq!(store.selected_table().unwrap().get(0, 1), Some("0.00"));
    assert!(!store.undo().unwrap());

    assert!(store.redo().unwrap());
    assert_eq!(store.selected_table().unwrap().get(0, 1), Some("9.99"));

    // A fresh edit drops the redo stack
    store.add_row(0, None).unwrap();
    assert!(!store.can_redo());
}

// =============================================================================
// Summary rows
// =============================================================================

#[test]
fn test_auto_detect_and_unmark() {
    let classifier = SummaryRowClassifier::new();
    let mut store = TableStore::new(vec![statement()]);

    let found = store.auto_detect_summary_rows(&classifier).unwrap();
    assert_eq!(found, vec![2, 4, 5]);

    store.unmark_summary_row(4).unwrap();
    assert!(store.auto_detect_summary_rows(&classifier).unwrap().is_empty());
    assert_eq!(store.selected_table().unwrap().summary_rows, BTreeSet::from([2, 5]));
    assert_eq!(store.unmarked_rows(), vec![4]);
}

#[test]
fn test_mark_similar_rows_from_reference() {
    let classifier = SummaryRowClassifier::new();
    let mut store = TableStore::new(vec![statement()]);

    let flagged = store.mark_similar_rows(2, &classifier).unwrap();
    assert_eq!(flagged, vec![2, 4]);
}

#[test]
fn test_hidden_summary_rows() {
    let mut store = TableStore::new(vec![statement().with_summary_rows([2, 4, 5])]);
    store.set_show_summary_rows(false);
    assert_eq!(store.visible_row_indices(), vec![0, 1, 3]);

    store.toggle_all().unwrap();
    assert!(store.is_all_selected());
    assert_eq!(store.selected_rows(), vec![0, 1, 3]);
}

// =============================================================================
// Mapping
// =============================================================================

#[test]
fn test_apply_mapping_to_every_table() {
    let transformer = FieldMappingTransformer::new();
    let tables = vec![
        statement().with_summary_rows([2, 4, 5]),
        Table::new(s(&["Commission", "Agent"]), vec![s(&["12.00", "Dee"])]),
    ];
    let mapping = FieldMapping::new()
        .with("agent_name", "Agent")
        .with("commission", "Commission");
    let fields = vec![
        FieldDescriptor::new("agent_name", "Agent").required(),
        FieldDescriptor::new("commission", "Commission"),
        FieldDescriptor::new("carrier", "Carrier"),
    ];

    let mapped = transformer.apply(&tables, &mapping, &fields).unwrap();

    assert_eq!(mapped[0].header, s(&["agent_name", "commission", "carrier"]));
    assert_eq!(mapped[0].rows[0], s(&["Alice", "100.00", ""]));
    assert_eq!(mapped[0].summary_rows, BTreeSet::from([2, 4, 5]));
    let records = to_records(&mapped[1]);
    assert_eq!(records[0]["agent_name"], "Dee");
    assert_eq!(records[0]["commission"], "12.00");
}

#[test]
fn test_skip_mapping_passes_tables_through() {
    let transformer = FieldMappingTransformer::new();
    let tables = vec![statement()];
    let passed = transformer.skip(&tables);

    assert_eq!(passed[0].rows, tables[0].rows);
    let fields = passed[0].field_config.as_ref().unwrap();
    assert_eq!(fields[5].key, "Commission");
}
