//! Property-based tests for table editing and summary rows.
//!
//! These tests use proptest to generate random tables and edit sequences and
//! verify that the table invariants hold after every operation.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p tally --test property_tests
//!
//! # Run with more cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p tally --test property_tests
//! ```

use std::collections::BTreeSet;

use proptest::prelude::*;

use tally::table::{shift_for_bulk_delete, shift_for_delete};
use tally::{SummaryRowClassifier, Table, TableStore};

// =============================================================================
// Test Strategies
// =============================================================================

/// Cell text, sometimes looking like an aggregate label or an amount.
fn cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z ]{0,12}",
        "[0-9]{1,4}\\.[0-9]{2}",
        Just("Total".to_string()),
        Just("Subtotal: West".to_string()),
        Just(String::new()),
    ]
}

/// A rectangular table with up to 12 rows and a random set of summary rows.
fn table() -> impl Strategy<Value = Table> {
    (1usize..6, 0usize..12).prop_flat_map(|(width, height)| {
        (
            prop::collection::vec("[A-Z][a-z]{0,8}", width),
            prop::collection::vec(prop::collection::vec(cell(), width), height),
            prop::collection::vec(any::<bool>(), height),
        )
            .prop_map(|(header, rows, flags)| {
                let summary = flags.into_iter().enumerate().filter(|(_, f)| *f).map(|(i, _)| i);
                Table::new(header, rows).with_summary_rows(summary)
            })
    })
}

#[derive(Debug, Clone)]
enum Edit {
    AddRow(usize),
    DeleteRow(usize),
    DeleteRows(Vec<usize>),
    AddColumn(usize),
    DeleteColumn(usize),
    EditCell(usize, usize),
    Mark(usize),
    Unmark(usize),
    AutoDetect,
    Undo,
    Redo,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..15).prop_map(Edit::AddRow),
        (0usize..15).prop_map(Edit::DeleteRow),
        prop::collection::vec(0usize..15, 0..5).prop_map(Edit::DeleteRows),
        (0usize..8).prop_map(Edit::AddColumn),
        (0usize..8).prop_map(Edit::DeleteColumn),
        (0usize..15, 0usize..8).prop_map(|(r, c)| Edit::EditCell(r, c)),
        (0usize..15).prop_map(Edit::Mark),
        (0usize..15).prop_map(Edit::Unmark),
        Just(Edit::AutoDetect),
        Just(Edit::Undo),
        Just(Edit::Redo),
    ]
}

fn run(store: &mut TableStore, edit: &Edit, classifier: &SummaryRowClassifier) {
    // Out-of-range edits are rejected; only the invariants matter here.
    let _ = match edit {
        Edit::AddRow(at) => store.add_row(*at, None).map(|_| ()),
        Edit::DeleteRow(i) => store.delete_row(*i).map(|_| ()),
        Edit::DeleteRows(rows) => store.delete_rows(rows).map(|_| ()),
        Edit::AddColumn(at) => store.add_column(*at, None).map(|_| ()),
        Edit::DeleteColumn(i) => store.delete_column(*i).map(|_| ()),
        Edit::EditCell(r, c) => store.edit_cell(*r, *c, "1.00").map(|_| ()),
        Edit::Mark(i) => store.mark_summary_row(*i),
        Edit::Unmark(i) => store.unmark_summary_row(*i),
        Edit::AutoDetect => store.auto_detect_summary_rows(classifier).map(|_| ()),
        Edit::Undo => store.undo().map(|_| ()),
        Edit::Redo => store.redo().map(|_| ()),
    };
}

// =============================================================================
// Table Invariants
// =============================================================================

mod invariant_tests {
    use super::*;

    proptest! {
        /// Every row stays as wide as the header and every summary index
        /// stays in range, whatever the edit sequence.
        #[test]
        fn edits_keep_table_consistent(
            table in table(),
            edits in prop::collection::vec(edit(), 0..30),
        ) {
            let classifier = SummaryRowClassifier::new();
            let mut store = TableStore::new(vec![table]);
            for edit in &edits {
                run(&mut store, edit, &classifier);
                let current = store.selected_table().unwrap();
                prop_assert!(current.is_consistent(), "after {:?}: {:?}", edit, current);
            }
        }

        /// Undoing every edit restores the original table.
        #[test]
        fn undo_restores_original(
            table in table(),
            edits in prop::collection::vec(edit(), 0..10),
        ) {
            let classifier = SummaryRowClassifier::new();
            let mut store = TableStore::new(vec![table.clone()]).with_undo_depth(50);
            for edit in edits.iter().filter(|e| !matches!(e, Edit::Undo | Edit::Redo)) {
                run(&mut store, edit, &classifier);
            }
            while store.undo().unwrap() {}
            prop_assert_eq!(store.selected_table().unwrap(), &table);
        }
    }
}

// =============================================================================
// Summary Re-indexing Properties
// =============================================================================

mod reindex_tests {
    use super::*;

    proptest! {
        /// Deleting one row drops its flag and shifts later flags down by one.
        #[test]
        fn single_delete_shifts_summary_rows(table in table(), pick in any::<prop::sample::Index>()) {
            prop_assume!(table.row_count() > 0);
            let index = pick.index(table.row_count());
            let before = table.summary_rows.clone();
            let mut store = TableStore::new(vec![table]);

            store.delete_row(index).unwrap();

            let expected: BTreeSet<usize> = before
                .iter()
                .filter(|&&i| i != index)
                .map(|&i| if i > index { i - 1 } else { i })
                .collect();
            prop_assert_eq!(&store.selected_table().unwrap().summary_rows, &expected);
        }

        /// A bulk delete gives the same result as deleting the rows one at a
        /// time from the highest index down.
        #[test]
        fn bulk_delete_matches_sequential(
            summary in prop::collection::btree_set(0usize..20, 0..20),
            removed in prop::collection::btree_set(0usize..20, 0..20),
        ) {
            let mut sequential = summary.clone();
            for &index in removed.iter().rev() {
                sequential = shift_for_delete(&sequential, index);
            }
            prop_assert_eq!(shift_for_bulk_delete(&summary, &removed), sequential);
        }

        /// Rows flagged before a bulk delete keep their content flagged.
        #[test]
        fn bulk_delete_keeps_flagged_content(
            table in table(),
            targets in prop::collection::vec(0usize..12, 0..6),
        ) {
            let flagged: Vec<Vec<String>> = table
                .summary_rows
                .iter()
                .filter(|i| !targets.contains(i))
                .map(|&i| table.rows[i].clone())
                .collect();
            let mut store = TableStore::new(vec![table]);

            store.delete_rows(&targets).unwrap();

            let after = store.selected_table().unwrap();
            let still: Vec<Vec<String>> = after
                .summary_rows
                .iter()
                .map(|&i| after.rows[i].clone())
                .collect();
            prop_assert_eq!(still, flagged);
        }
    }
}
