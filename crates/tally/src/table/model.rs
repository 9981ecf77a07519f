//! The canonical in-memory table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::mapping::FieldDescriptor;

use super::indices;

/// A table extracted from a statement.
///
/// Every row has exactly `header.len()` cells and every index in
/// `summary_rows` is below `rows.len()`. All mutating methods keep both
/// properties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Optional display name for the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Column names, in order.
    pub header: Vec<String>,

    /// Cell values, row-major.
    pub rows: Vec<Vec<String>>,

    /// Indices of rows flagged as aggregate lines.
    #[serde(default)]
    pub summary_rows: BTreeSet<usize>,

    /// Canonical field descriptors, set once a mapping is applied or skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_config: Option<Vec<FieldDescriptor>>,
}

impl Table {
    /// Create a table, padding or truncating rows to the header width.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self {
            name: None,
            header,
            rows,
            summary_rows: BTreeSet::new(),
            field_config: None,
        }
    }

    /// Set the table name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the summary rows, dropping indices that are out of range.
    pub fn with_summary_rows(mut self, rows: impl IntoIterator<Item = usize>) -> Self {
        let count = self.rows.len();
        self.summary_rows = rows.into_iter().filter(|&r| r < count).collect();
        self
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col).map(|s| s.as_str()))
    }

    /// Get a row by index.
    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Find a column's position by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(|s| s.as_str()).unwrap_or(""))
    }

    /// Check whether a row is flagged as a summary row.
    pub fn is_summary_row(&self, index: usize) -> bool {
        self.summary_rows.contains(&index)
    }

    /// Rows that are not flagged as summary rows, with their indices.
    pub fn line_item_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.summary_rows.contains(i))
            .map(|(i, r)| (i, r.as_slice()))
    }

    /// Restore the invariants on a table built outside this module.
    pub fn normalize(&mut self) {
        let width = self.header.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        let count = self.rows.len();
        self.summary_rows.retain(|&i| i < count);
    }

    /// Check the width and summary-index invariants.
    pub fn is_consistent(&self) -> bool {
        let width = self.header.len();
        self.rows.iter().all(|r| r.len() == width)
            && self.summary_rows.iter().all(|&i| i < self.rows.len())
    }

    /// Insert a row at `position` (clamped to the end).
    ///
    /// Returns the index the row was inserted at.
    pub fn insert_row(&mut self, position: usize, data: Option<Vec<String>>) -> usize {
        let position = position.min(self.rows.len());
        let mut row = data.unwrap_or_default();
        row.resize(self.header.len(), String::new());

        self.rows.insert(position, row);
        self.summary_rows = indices::shift_for_insert(&self.summary_rows, position);
        position
    }

    /// Remove a single row.
    pub fn remove_row(&mut self, index: usize) -> Result<Vec<String>> {
        self.check_row(index)?;
        let removed = self.rows.remove(index);
        self.summary_rows = indices::shift_for_delete(&self.summary_rows, index);
        Ok(removed)
    }

    /// Remove several rows at once.
    ///
    /// Duplicate and out-of-range indices are ignored. Returns the number of
    /// rows removed.
    pub fn remove_rows(&mut self, targets: &[usize]) -> usize {
        let removed: BTreeSet<usize> = targets
            .iter()
            .copied()
            .filter(|&i| i < self.rows.len())
            .collect();
        if removed.is_empty() {
            return 0;
        }

        // Highest first so earlier indices stay valid.
        for &index in removed.iter().rev() {
            self.rows.remove(index);
        }
        self.summary_rows = indices::shift_for_bulk_delete(&self.summary_rows, &removed);
        removed.len()
    }

    /// Replace a cell's value, returning the previous value.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<String> {
        self.check_row(row)?;
        self.check_column(col)?;
        Ok(std::mem::replace(&mut self.rows[row][col], value.into()))
    }

    /// Insert a column at `position` (clamped to the end).
    ///
    /// Without a name, `Column N` is generated where N is the new column count,
    /// bumped until it does not collide with an existing header.
    pub fn insert_column(&mut self, position: usize, name: Option<String>) -> usize {
        let position = position.min(self.header.len());
        let name = name.unwrap_or_else(|| self.generated_column_name());

        self.header.insert(position, name);
        for row in &mut self.rows {
            row.insert(position, String::new());
        }
        self.field_config = None;
        position
    }

    /// Rename a column, returning the previous name.
    pub fn rename_column(&mut self, index: usize, name: impl Into<String>) -> Result<String> {
        self.check_column(index)?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TallyError::Validation(
                "Column name must not be empty".to_string(),
            ));
        }
        Ok(std::mem::replace(&mut self.header[index], name))
    }

    /// Remove a column and its cell in every row.
    pub fn remove_column(&mut self, index: usize) -> Result<String> {
        self.check_column(index)?;
        let removed = self.header.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        self.field_config = None;
        Ok(removed)
    }

    fn generated_column_name(&self) -> String {
        let mut n = self.header.len() + 1;
        loop {
            let candidate = format!("Column {}", n);
            if !self.header.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn check_row(&self, index: usize) -> Result<()> {
        if index >= self.rows.len() {
            return Err(TallyError::Validation(format!(
                "Row {} out of range (table has {} rows)",
                index,
                self.rows.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn check_column(&self, index: usize) -> Result<()> {
        if index >= self.header.len() {
            return Err(TallyError::Validation(format!(
                "Column {} out of range (table has {} columns)",
                index,
                self.header.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample() -> Table {
        Table::new(
            s(&["Agent", "Region", "Commission"]),
            vec![
                s(&["Alice", "West", "120.00"]),
                s(&["Bob", "East", "80.00"]),
                s(&["Total", "", "200.00"]),
            ],
        )
        .with_summary_rows([2])
    }

    #[test]
    fn test_new_pads_and_truncates() {
        let table = Table::new(s(&["a", "b"]), vec![s(&["1"]), s(&["1", "2", "3"])]);
        assert_eq!(table.rows[0], s(&["1", ""]));
        assert_eq!(table.rows[1], s(&["1", "2"]));
        assert!(table.is_consistent());
    }

    #[test]
    fn test_insert_row_shifts_summary() {
        let mut table = sample();
        table.insert_row(1, Some(s(&["Carol"])));

        assert_eq!(table.rows[1], s(&["Carol", "", ""]));
        assert_eq!(table.summary_rows, BTreeSet::from([3]));
    }

    #[test]
    fn test_insert_row_past_end_appends() {
        let mut table = sample();
        let at = table.insert_row(99, None);
        assert_eq!(at, 3);
        assert_eq!(table.summary_rows, BTreeSet::from([2]));
    }

    #[test]
    fn test_remove_summary_row_drops_index() {
        let mut table = sample();
        table.remove_row(2).unwrap();
        assert!(table.summary_rows.is_empty());
    }

    #[test]
    fn test_remove_row_out_of_range() {
        let mut table = sample();
        assert!(matches!(table.remove_row(5), Err(TallyError::Validation(_))));
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_column_ops_keep_width() {
        let mut table = sample();
        table.insert_column(1, None);
        assert_eq!(table.header[1], "Column 4");
        assert!(table.is_consistent());

        table.remove_column(0).unwrap();
        assert_eq!(table.header, s(&["Column 4", "Region", "Commission"]));
        assert!(table.is_consistent());
    }

    #[test]
    fn test_generated_name_avoids_collision() {
        let mut table = Table::new(s(&["Column 2"]), vec![]);
        table.insert_column(1, None);
        assert_eq!(table.header, s(&["Column 2", "Column 3"]));
    }

    #[test]
    fn test_rename_rejects_blank() {
        let mut table = sample();
        assert!(table.rename_column(0, "  ").is_err());
        assert_eq!(table.rename_column(0, "Producer").unwrap(), "Agent");
    }

    #[test]
    fn test_line_item_rows_skip_summaries() {
        let table = sample();
        let items: Vec<usize> = table.line_item_rows().map(|(i, _)| i).collect();
        assert_eq!(items, vec![0, 1]);
    }
}
