//! Row selection over the visible rows of a table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Selection state derived for the currently visible rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// Visible rows that are selected.
    pub selected: usize,
    /// Rows currently visible.
    pub visible: usize,
}

impl SelectionSummary {
    /// Every visible row is selected (and there is at least one).
    pub fn is_all_selected(&self) -> bool {
        self.visible > 0 && self.selected == self.visible
    }

    /// Some, but not all, visible rows are selected.
    pub fn is_indeterminate(&self) -> bool {
        self.selected > 0 && self.selected < self.visible
    }
}

/// A set of selected row indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSelection {
    rows: BTreeSet<usize>,
}

impl RowSelection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one row. Returns whether the row is now selected.
    pub fn toggle(&mut self, row: usize) -> bool {
        if self.rows.remove(&row) {
            false
        } else {
            self.rows.insert(row);
            true
        }
    }

    /// Select every visible row, or clear them if all are already selected.
    pub fn toggle_all(&mut self, visible: &[usize]) {
        if self.summary(visible).is_all_selected() {
            for row in visible {
                self.rows.remove(row);
            }
        } else {
            self.rows.extend(visible.iter().copied());
        }
    }

    /// Count selected rows among `visible`.
    pub fn summary(&self, visible: &[usize]) -> SelectionSummary {
        SelectionSummary {
            selected: visible.iter().filter(|r| self.rows.contains(r)).count(),
            visible: visible.len(),
        }
    }

    /// Whether a row is selected.
    pub fn contains(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    /// Selected rows in ascending order.
    pub fn rows(&self) -> Vec<usize> {
        self.rows.iter().copied().collect()
    }

    /// Number of selected rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Clear the selection.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub(crate) fn set(&self) -> &BTreeSet<usize> {
        &self.rows
    }

    pub(crate) fn replace(&mut self, rows: BTreeSet<usize>) {
        self.rows = rows;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_row() {
        let mut sel = RowSelection::new();
        assert!(sel.toggle(2));
        assert!(sel.contains(2));
        assert!(!sel.toggle(2));
        assert!(sel.is_empty());
    }

    #[test]
    fn test_toggle_all_selects_then_clears() {
        let mut sel = RowSelection::new();
        let visible = [0, 1, 3];

        sel.toggle(1);
        assert!(sel.summary(&visible).is_indeterminate());

        sel.toggle_all(&visible);
        assert!(sel.summary(&visible).is_all_selected());

        sel.toggle_all(&visible);
        assert_eq!(sel.summary(&visible).selected, 0);
    }

    #[test]
    fn test_hidden_rows_do_not_count() {
        let mut sel = RowSelection::new();
        sel.toggle(2);
        let summary = sel.summary(&[0, 1]);
        assert_eq!(summary.selected, 0);
        assert!(!summary.is_indeterminate());
    }

    #[test]
    fn test_empty_visible_is_never_all_selected() {
        let sel = RowSelection::new();
        assert!(!sel.summary(&[]).is_all_selected());
    }
}
