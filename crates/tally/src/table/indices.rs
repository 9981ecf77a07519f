//! Re-indexing of row index sets after row insertion and deletion.

use std::collections::BTreeSet;

/// Shift indices after a row is inserted at `at`.
pub fn shift_for_insert(set: &BTreeSet<usize>, at: usize) -> BTreeSet<usize> {
    set.iter()
        .map(|&i| if i >= at { i + 1 } else { i })
        .collect()
}

/// Shift indices after the row at `removed` is deleted.
pub fn shift_for_delete(set: &BTreeSet<usize>, removed: usize) -> BTreeSet<usize> {
    set.iter()
        .filter(|&&i| i != removed)
        .map(|&i| if i > removed { i - 1 } else { i })
        .collect()
}

/// Shift indices after every row in `removed` is deleted at once.
///
/// Each surviving index moves down by the number of removed indices below it.
pub fn shift_for_bulk_delete(set: &BTreeSet<usize>, removed: &BTreeSet<usize>) -> BTreeSet<usize> {
    set.iter()
        .filter(|i| !removed.contains(i))
        .map(|&i| i - removed.range(..i).count())
        .collect()
}
