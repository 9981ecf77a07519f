//! Editable store over the tables of one document.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Result, TallyError};
use crate::summary::SummaryRowClassifier;

use super::indices;
use super::model::Table;
use super::selection::{RowSelection, SelectionSummary};

/// Default number of undo snapshots kept per table.
const DEFAULT_UNDO_DEPTH: usize = 50;

/// Saved state of one table for undo/redo.
#[derive(Debug, Clone)]
struct TableSnapshot {
    table: Table,
    unmarked: BTreeSet<usize>,
}

/// Per-table editing state.
#[derive(Debug, Clone)]
struct TableState {
    table: Table,
    selection: RowSelection,
    /// Rows the reviewer explicitly unmarked as summary rows.
    unmarked: BTreeSet<usize>,
    undo: Vec<TableSnapshot>,
    redo: Vec<TableSnapshot>,
}

impl TableState {
    fn new(table: Table) -> Self {
        Self {
            table,
            selection: RowSelection::new(),
            unmarked: BTreeSet::new(),
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            table: self.table.clone(),
            unmarked: self.unmarked.clone(),
        }
    }

    fn restore(&mut self, snapshot: TableSnapshot) {
        self.table = snapshot.table;
        self.unmarked = snapshot.unmarked;
        self.selection.clear();
    }
}

/// In-memory tables of a document plus the reviewer's editing state.
///
/// All operations act on the currently selected table. Structural edits
/// keep every row as wide as the header, and keep summary marks, explicit
/// unmarks and the row selection pointing at the same rows after rows move.
#[derive(Debug, Clone)]
pub struct TableStore {
    tables: Vec<TableState>,
    selected: usize,
    show_summary_rows: bool,
    undo_depth: usize,
}

impl TableStore {
    /// Create a store over the given tables.
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables: tables.into_iter().map(TableState::new).collect(),
            selected: 0,
            show_summary_rows: true,
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }

    /// Set the maximum number of undo snapshots per table.
    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    /// Replace every table, discarding selection and undo history.
    pub fn replace_all(&mut self, tables: Vec<Table>) {
        debug!(tables = tables.len(), "replacing table set");
        self.tables = tables.into_iter().map(TableState::new).collect();
        self.selected = 0;
    }

    /// All tables, in order.
    pub fn tables(&self) -> Vec<&Table> {
        self.tables.iter().map(|s| &s.table).collect()
    }

    /// Clone every table.
    pub fn to_tables(&self) -> Vec<Table> {
        self.tables.iter().map(|s| s.table.clone()).collect()
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Whether the store holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Index of the table operations apply to.
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// The table operations apply to.
    pub fn selected_table(&self) -> Option<&Table> {
        self.tables.get(self.selected).map(|s| &s.table)
    }

    /// Choose which table operations apply to.
    pub fn select_table(&mut self, index: usize) -> Result<()> {
        if index >= self.tables.len() {
            return Err(TallyError::Validation(format!(
                "Table {} out of range ({} tables)",
                index,
                self.tables.len()
            )));
        }
        self.selected = index;
        Ok(())
    }

    /// Get a table by index.
    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index).map(|s| &s.table)
    }

    // Row operations

    /// Insert a row at `position`. Returns the index it landed at.
    pub fn add_row(&mut self, position: usize, data: Option<Vec<String>>) -> Result<usize> {
        let state = self.edit()?;
        let at = state.table.insert_row(position, data);
        state.unmarked = indices::shift_for_insert(&state.unmarked, at);
        state
            .selection
            .replace(indices::shift_for_insert(state.selection.set(), at));
        debug!(row = at, "added row");
        Ok(at)
    }

    /// Delete one row.
    pub fn delete_row(&mut self, index: usize) -> Result<Vec<String>> {
        self.current()?.table.check_row(index)?;
        let state = self.edit()?;
        let removed = state.table.remove_row(index)?;
        state.unmarked = indices::shift_for_delete(&state.unmarked, index);
        state
            .selection
            .replace(indices::shift_for_delete(state.selection.set(), index));
        debug!(row = index, "deleted row");
        Ok(removed)
    }

    /// Delete several rows. Duplicates and out-of-range indices are ignored.
    ///
    /// Returns the number of rows removed.
    pub fn delete_rows(&mut self, targets: &[usize]) -> Result<usize> {
        let rows = self.current()?.table.row_count();
        let removed: BTreeSet<usize> = targets.iter().copied().filter(|&i| i < rows).collect();
        if removed.is_empty() {
            return Ok(0);
        }

        let state = self.edit()?;
        let count = state.table.remove_rows(targets);
        state.unmarked = indices::shift_for_bulk_delete(&state.unmarked, &removed);
        state
            .selection
            .replace(indices::shift_for_bulk_delete(state.selection.set(), &removed));
        debug!(rows = count, "deleted rows");
        Ok(count)
    }

    /// Delete every selected row.
    pub fn delete_selected(&mut self) -> Result<usize> {
        let selected = self.current()?.selection.rows();
        self.delete_rows(&selected)
    }

    /// Change one cell. Returns the previous value.
    pub fn edit_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<String> {
        {
            let table = &self.current()?.table;
            table.check_row(row)?;
            table.check_column(col)?;
        }
        let state = self.edit()?;
        state.table.set_cell(row, col, value)
    }

    // Column operations

    /// Insert a column at `position`. Returns the index it landed at.
    pub fn add_column(&mut self, position: usize, name: Option<String>) -> Result<usize> {
        let state = self.edit()?;
        let at = state.table.insert_column(position, name);
        debug!(column = at, "added column");
        Ok(at)
    }

    /// Rename a column. Returns the previous name.
    pub fn rename_column(&mut self, index: usize, name: impl Into<String>) -> Result<String> {
        let name = name.into();
        {
            let table = &self.current()?.table;
            table.check_column(index)?;
            if name.trim().is_empty() {
                return Err(TallyError::Validation(
                    "Column name must not be empty".to_string(),
                ));
            }
        }
        let state = self.edit()?;
        state.table.rename_column(index, name)
    }

    /// Delete a column. Returns its name.
    pub fn delete_column(&mut self, index: usize) -> Result<String> {
        self.current()?.table.check_column(index)?;
        let state = self.edit()?;
        let removed = state.table.remove_column(index)?;
        debug!(column = index, name = %removed, "deleted column");
        Ok(removed)
    }

    // Summary rows

    /// Flag a row as a summary row. Clears any earlier explicit unmark.
    pub fn mark_summary_row(&mut self, row: usize) -> Result<()> {
        self.current()?.table.check_row(row)?;
        let state = self.edit()?;
        state.unmarked.remove(&row);
        state.table.summary_rows.insert(row);
        Ok(())
    }

    /// Clear a row's summary flag and keep auto-detection from re-adding it.
    pub fn unmark_summary_row(&mut self, row: usize) -> Result<()> {
        self.current()?.table.check_row(row)?;
        let state = self.edit()?;
        state.table.summary_rows.remove(&row);
        state.unmarked.insert(row);
        Ok(())
    }

    /// Run the classifier over the selected table and add what it finds.
    ///
    /// Existing marks are kept and explicitly unmarked rows are skipped.
    /// Returns the newly flagged rows.
    pub fn auto_detect_summary_rows(&mut self, classifier: &SummaryRowClassifier) -> Result<Vec<usize>> {
        let state = self.current()?;
        let detected = classifier.detect(&state.table.rows);
        self.add_summary_rows(detected)
    }

    /// Run auto-detection over every table. Returns the newly flagged rows per table.
    pub fn auto_detect_all(&mut self, classifier: &SummaryRowClassifier) -> Vec<Vec<usize>> {
        let selected = self.selected;
        let mut added = Vec::with_capacity(self.tables.len());
        for index in 0..self.tables.len() {
            self.selected = index;
            added.push(self.auto_detect_summary_rows(classifier).unwrap_or_default());
        }
        self.selected = selected;
        added
    }

    /// Flag every row similar to `reference` (and the reference itself).
    ///
    /// Returns the newly flagged rows.
    pub fn mark_similar_rows(
        &mut self,
        reference: usize,
        classifier: &SummaryRowClassifier,
    ) -> Result<Vec<usize>> {
        let state = self.current()?;
        state.table.check_row(reference)?;
        let mut rows = classifier.find_similar_rows(&state.table.rows, reference);
        rows.push(reference);
        self.add_summary_rows(rows)
    }

    fn add_summary_rows(&mut self, rows: Vec<usize>) -> Result<Vec<usize>> {
        let state = self.current()?;
        let new_rows: BTreeSet<usize> = rows
            .into_iter()
            .filter(|r| !state.table.summary_rows.contains(r) && !state.unmarked.contains(r))
            .collect();
        if new_rows.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.edit()?;
        state.table.summary_rows.extend(new_rows.iter().copied());
        debug!(rows = ?new_rows, "flagged summary rows");
        Ok(new_rows.into_iter().collect())
    }

    /// Rows the reviewer explicitly unmarked in the selected table.
    pub fn unmarked_rows(&self) -> Vec<usize> {
        self.current()
            .map(|s| s.unmarked.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Explicit unmarks of every table, in table order.
    pub fn unmarked_by_table(&self) -> Vec<Vec<usize>> {
        self.tables
            .iter()
            .map(|s| s.unmarked.iter().copied().collect())
            .collect()
    }

    /// Restore explicit unmarks, one list per table.
    ///
    /// Rows outside a table and rows currently flagged as summary rows are
    /// dropped. Undo history is left alone.
    pub fn restore_unmarked(&mut self, unmarked: &[Vec<usize>]) {
        for (state, rows) in self.tables.iter_mut().zip(unmarked) {
            let row_count = state.table.rows.len();
            state.unmarked = rows
                .iter()
                .copied()
                .filter(|r| *r < row_count && !state.table.summary_rows.contains(r))
                .collect();
        }
    }

    // Visibility and selection

    /// Show or hide summary rows in [`visible_rows`](Self::visible_rows).
    pub fn set_show_summary_rows(&mut self, show: bool) {
        self.show_summary_rows = show;
    }

    /// Whether summary rows are visible.
    pub fn shows_summary_rows(&self) -> bool {
        self.show_summary_rows
    }

    /// Indices of the rows currently visible in the selected table.
    pub fn visible_row_indices(&self) -> Vec<usize> {
        let Ok(state) = self.current() else {
            return Vec::new();
        };
        (0..state.table.row_count())
            .filter(|i| self.show_summary_rows || !state.table.is_summary_row(*i))
            .collect()
    }

    /// Visible rows of the selected table with their indices.
    pub fn visible_rows(&self) -> Vec<(usize, &[String])> {
        let Ok(state) = self.current() else {
            return Vec::new();
        };
        state
            .table
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| self.show_summary_rows || !state.table.is_summary_row(*i))
            .map(|(i, r)| (i, r.as_slice()))
            .collect()
    }

    /// Flip the selection of one row. Returns whether it is now selected.
    pub fn toggle_row(&mut self, row: usize) -> Result<bool> {
        self.current()?.table.check_row(row)?;
        let index = self.selected;
        Ok(self.tables[index].selection.toggle(row))
    }

    /// Select all visible rows, or clear them if all are already selected.
    pub fn toggle_all(&mut self) -> Result<()> {
        let visible = self.visible_row_indices();
        self.current_mut()?.selection.toggle_all(&visible);
        Ok(())
    }

    /// Selection counts over the visible rows.
    pub fn selection_summary(&self) -> SelectionSummary {
        let visible = self.visible_row_indices();
        self.current()
            .map(|s| s.selection.summary(&visible))
            .unwrap_or(SelectionSummary {
                selected: 0,
                visible: 0,
            })
    }

    /// Every visible row is selected.
    pub fn is_all_selected(&self) -> bool {
        self.selection_summary().is_all_selected()
    }

    /// Some, but not all, visible rows are selected.
    pub fn is_indeterminate(&self) -> bool {
        self.selection_summary().is_indeterminate()
    }

    /// Selected rows of the selected table, ascending.
    pub fn selected_rows(&self) -> Vec<usize> {
        self.current().map(|s| s.selection.rows()).unwrap_or_default()
    }

    // Undo / redo

    /// Whether the selected table has an edit to undo.
    pub fn can_undo(&self) -> bool {
        self.current().is_ok_and(|s| !s.undo.is_empty())
    }

    /// Whether the selected table has an undone edit to redo.
    pub fn can_redo(&self) -> bool {
        self.current().is_ok_and(|s| !s.redo.is_empty())
    }

    /// Revert the last edit to the selected table. Returns false if there was none.
    pub fn undo(&mut self) -> Result<bool> {
        let state = self.current_mut()?;
        let Some(previous) = state.undo.pop() else {
            return Ok(false);
        };
        let current = state.snapshot();
        state.redo.push(current);
        state.restore(previous);
        debug!("undo");
        Ok(true)
    }

    /// Re-apply the last undone edit. Returns false if there was none.
    pub fn redo(&mut self) -> Result<bool> {
        let state = self.current_mut()?;
        let Some(next) = state.redo.pop() else {
            return Ok(false);
        };
        let current = state.snapshot();
        state.undo.push(current);
        state.restore(next);
        debug!("redo");
        Ok(true)
    }

    // Helpers

    fn current(&self) -> Result<&TableState> {
        self.tables
            .get(self.selected)
            .ok_or_else(|| TallyError::Validation("No table selected".to_string()))
    }

    fn current_mut(&mut self) -> Result<&mut TableState> {
        self.tables
            .get_mut(self.selected)
            .ok_or_else(|| TallyError::Validation("No table selected".to_string()))
    }

    /// Record an undo snapshot and hand out the selected table for mutation.
    ///
    /// Callers validate their arguments first so a failed edit leaves no
    /// snapshot behind.
    fn edit(&mut self) -> Result<&mut TableState> {
        let depth = self.undo_depth;
        let state = self.current_mut()?;
        if depth > 0 {
            let snapshot = state.snapshot();
            state.undo.push(snapshot);
            if state.undo.len() > depth {
                state.undo.remove(0);
            }
        }
        state.redo.clear();
        Ok(state)
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn store() -> TableStore {
        let table = Table::new(
            s(&["Agent", "Region", "Plan", "Commission"]),
            vec![
                s(&["Alice", "West", "A", "120.00"]),
                s(&["Bob", "East", "B", "80.00"]),
                s(&["Total", "", "", "200.00"]),
                s(&["Carol", "West", "A", "50.00"]),
            ],
        );
        TableStore::new(vec![table])
    }

    #[test]
    fn test_add_row_shifts_selection_and_marks() {
        let mut store = store();
        store.mark_summary_row(2).unwrap();
        store.toggle_row(3).unwrap();

        store.add_row(1, None).unwrap();

        let table = store.selected_table().unwrap();
        assert_eq!(table.summary_rows, BTreeSet::from([3]));
        assert_eq!(store.selected_rows(), vec![4]);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_delete_rows_bulk() {
        let mut store = store();
        store.mark_summary_row(2).unwrap();
        assert_eq!(store.delete_rows(&[0, 0, 3, 17]).unwrap(), 2);

        let table = store.selected_table().unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.summary_rows, BTreeSet::from([1]));
    }

    #[test]
    fn test_delete_selected() {
        let mut store = store();
        store.toggle_row(0).unwrap();
        store.toggle_row(1).unwrap();
        assert_eq!(store.delete_selected().unwrap(), 2);
        assert!(store.selected_rows().is_empty());
        assert_eq!(store.selected_table().unwrap().rows[0][0], "Total");
    }

    #[test]
    fn test_failed_edit_leaves_no_undo() {
        let mut store = store();
        assert!(store.edit_cell(9, 0, "x").is_err());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_undo_redo_edit_cell() {
        let mut store = store();
        store.edit_cell(0, 3, "125.00").unwrap();
        assert_eq!(store.selected_table().unwrap().get(0, 3), Some("125.00"));

        assert!(store.undo().unwrap());
        assert_eq!(store.selected_table().unwrap().get(0, 3), Some("120.00"));
        assert!(store.can_redo());

        assert!(store.redo().unwrap());
        assert_eq!(store.selected_table().unwrap().get(0, 3), Some("125.00"));
        assert!(!store.redo().unwrap());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut store = store();
        store.delete_column(1).unwrap();
        store.undo().unwrap();
        store.add_column(0, Some("Carrier".to_string())).unwrap();
        assert!(!store.can_redo());
    }

    #[test]
    fn test_undo_depth_is_bounded() {
        let mut store = store().with_undo_depth(2);
        for value in ["1", "2", "3"] {
            store.edit_cell(0, 0, value).unwrap();
        }
        assert!(store.undo().unwrap());
        assert!(store.undo().unwrap());
        assert!(!store.undo().unwrap());
        assert_eq!(store.selected_table().unwrap().get(0, 0), Some("1"));
    }

    #[test]
    fn test_auto_detect_respects_unmark() {
        let mut store = store();
        let classifier = SummaryRowClassifier::new();

        assert_eq!(store.auto_detect_summary_rows(&classifier).unwrap(), vec![2]);
        store.unmark_summary_row(2).unwrap();
        assert!(store.auto_detect_summary_rows(&classifier).unwrap().is_empty());
        assert!(store.selected_table().unwrap().summary_rows.is_empty());

        store.mark_summary_row(0).unwrap();
        store.auto_detect_summary_rows(&classifier).unwrap();
        assert_eq!(
            store.selected_table().unwrap().summary_rows,
            BTreeSet::from([0])
        );
    }

    #[test]
    fn test_restore_unmarked_blocks_auto_detect() {
        let mut original = store();
        original.unmark_summary_row(2).unwrap();
        let unmarked = original.unmarked_by_table();
        assert_eq!(unmarked, vec![vec![2]]);

        let mut restored = TableStore::new(original.to_tables());
        restored.restore_unmarked(&[vec![2, 99]]);
        assert_eq!(restored.unmarked_rows(), vec![2]);
        assert!(!restored.can_undo());

        let classifier = SummaryRowClassifier::new();
        assert!(restored.auto_detect_summary_rows(&classifier).unwrap().is_empty());
    }

    #[test]
    fn test_hidden_summary_rows_and_selection() {
        let mut store = store();
        store.mark_summary_row(2).unwrap();
        store.set_show_summary_rows(false);

        assert_eq!(store.visible_row_indices(), vec![0, 1, 3]);

        store.toggle_row(0).unwrap();
        assert!(store.is_indeterminate());

        store.toggle_all().unwrap();
        assert!(store.is_all_selected());
        assert_eq!(store.selected_rows(), vec![0, 1, 3]);
    }

    #[test]
    fn test_select_table_out_of_range() {
        let mut store = store();
        assert!(store.select_table(1).is_err());
        assert_eq!(store.selected_index(), 0);
    }
}
