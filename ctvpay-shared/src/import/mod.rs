/// Bulk salary import from spreadsheets
///
/// - [`amount`]: amount normalization (`"150,5"` becomes 150 500)
/// - [`spreadsheet`]: reading the first worksheet into text rows
/// - [`reconcile`]: matching rows to collaborators and committing the batch

pub mod amount;
pub mod reconcile;
pub mod spreadsheet;

pub use reconcile::{
    import_salaries, CollaboratorDirectory, ImportError, ImportOptions, ImportReport, RowFailure,
    RowFailureReason, SalaryLedger,
};
pub use spreadsheet::{ImportColumns, SpreadsheetError};
