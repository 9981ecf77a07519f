//! Table data and the editing operations a reviewer performs on it.
//!
//! - [`RawTable`] normalises loosely-shaped extraction output
//! - [`Table`] is the canonical table with its width and summary-row invariants
//! - [`TableStore`] holds the tables of one document with selection and undo

mod indices;
mod model;
mod raw;
mod selection;
mod store;

pub use indices::{shift_for_bulk_delete, shift_for_delete, shift_for_insert};
pub use model::Table;
pub use raw::RawTable;
pub(crate) use raw::cell_text;
pub use selection::{RowSelection, SelectionSummary};
pub use store::TableStore;
