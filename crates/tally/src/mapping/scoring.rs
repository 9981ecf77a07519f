//! Scoring extracted tables for mapping suitability.

use serde::{Deserialize, Serialize};

use crate::summary::parse_amount;
use crate::table::Table;

/// Rows at which the row-volume factor saturates.
const ROW_VOLUME_CAP: usize = 20;

/// Breakdown of a table's suitability score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableScore {
    /// Share of non-empty header cells.
    pub header_fill: f64,
    /// Share of non-empty data cells.
    pub density: f64,
    /// `min(rows, 20) / 20`.
    pub row_volume: f64,
    /// Share of columns whose non-empty cells are mostly numeric.
    pub numeric_columns: f64,
}

impl TableScore {
    /// Mean of the four factors, in `0.0..=1.0`.
    pub fn total(&self) -> f64 {
        (self.header_fill + self.density + self.row_volume + self.numeric_columns) / 4.0
    }
}

/// Score one table.
pub fn score_table(table: &Table) -> TableScore {
    let columns = table.column_count();
    if columns == 0 {
        return TableScore {
            header_fill: 0.0,
            density: 0.0,
            row_volume: 0.0,
            numeric_columns: 0.0,
        };
    }

    let header_fill =
        table.header.iter().filter(|h| !h.trim().is_empty()).count() as f64 / columns as f64;

    let cells = table.row_count() * columns;
    let filled = table
        .rows
        .iter()
        .flatten()
        .filter(|c| !c.trim().is_empty())
        .count();
    let density = if cells == 0 {
        0.0
    } else {
        filled as f64 / cells as f64
    };

    let row_volume = table.row_count().min(ROW_VOLUME_CAP) as f64 / ROW_VOLUME_CAP as f64;

    let numeric = (0..columns).filter(|&c| is_numeric_column(table, c)).count();
    let numeric_columns = numeric as f64 / columns as f64;

    TableScore {
        header_fill,
        density,
        row_volume,
        numeric_columns,
    }
}

/// Index of the most suitable table. Ties go to the lowest index.
pub fn best_table(tables: &[Table]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, table) in tables.iter().enumerate() {
        let score = score_table(table).total();
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

fn is_numeric_column(table: &Table, column: usize) -> bool {
    let values: Vec<&str> = table
        .column_values(column)
        .filter(|v| !v.trim().is_empty())
        .collect();
    if values.is_empty() {
        return false;
    }
    let numeric = values.iter().filter(|v| parse_amount(v).is_some()).count();
    numeric * 2 > values.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_score_factors() {
        let table = Table::new(
            s(&["Agent", "", "Commission", "Rate"]),
            vec![
                s(&["Alice", "", "120.00", "5%"]),
                s(&["Bob", "", "$80", "n/a"]),
            ],
        );

        let score = score_table(&table);
        assert_eq!(score.header_fill, 0.75);
        assert_eq!(score.density, 6.0 / 8.0);
        assert_eq!(score.row_volume, 0.1);
        assert_eq!(score.numeric_columns, 0.25);
        assert!((score.total() - (0.75 + 0.75 + 0.1 + 0.25) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_table_scores_zero() {
        assert_eq!(score_table(&Table::default()).total(), 0.0);
    }

    #[test]
    fn test_best_table_prefers_richer_table_and_lowest_tie() {
        let sparse = Table::new(s(&["A", ""]), vec![s(&["", ""])]);
        let rich = Table::new(s(&["Agent", "Amount"]), vec![s(&["Alice", "10"]); 20]);

        assert_eq!(best_table(&[sparse.clone(), rich.clone()]), Some(1));
        assert_eq!(best_table(&[rich.clone(), rich]), Some(0));
        assert_eq!(best_table(&[]), None);
    }
}
