/// Spreadsheet reading for salary imports
///
/// The first worksheet is read. Its first non-empty row is the header row; the
/// two configured headers locate the external-ID and amount columns. Every later
/// row that has at least one non-empty cell becomes a [`SheetRow`].
///
/// Cells are rendered to text: numbers in their shortest decimal form, strings
/// trimmed, empty cells as `""`.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

/// Default header of the external messaging ID column
pub const DEFAULT_ID_COLUMN: &str = "Row Labels";

/// Default header of the amount column
pub const DEFAULT_AMOUNT_COLUMN: &str = "Sum of LƯƠNG";

/// Header names that locate the two import columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportColumns {
    pub id_column: String,
    pub amount_column: String,
}

impl Default for ImportColumns {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            amount_column: DEFAULT_AMOUNT_COLUMN.to_string(),
        }
    }
}

/// One data row, as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number in the worksheet
    pub row_number: usize,

    /// Trimmed external ID (may be empty)
    pub external_id: String,

    /// Raw amount text (may be empty)
    pub raw_amount: String,
}

/// File-level read failures
#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("file is empty or unreadable")]
    Empty,

    #[error("file is empty or unreadable ({0})")]
    Unreadable(String),

    #[error("missing column \"{0}\"")]
    MissingColumn(String),
}

/// Reads the data rows of the first worksheet
///
/// Takes ownership of the uploaded bytes; they are dropped when this returns.
pub fn read_rows(bytes: Vec<u8>, columns: &ImportColumns) -> Result<Vec<SheetRow>, SpreadsheetError> {
    if bytes.is_empty() {
        return Err(SpreadsheetError::Empty);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::Empty)?
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;

    rows_from_range(&range, columns)
}

fn rows_from_range(range: &Range<Data>, columns: &ImportColumns) -> Result<Vec<SheetRow>, SpreadsheetError> {
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = range.rows().enumerate().filter(|(_, cells)| !is_blank(cells));

    let (_, header) = rows.next().ok_or(SpreadsheetError::Empty)?;
    let id_index = column_index(header, &columns.id_column)?;
    let amount_index = column_index(header, &columns.amount_column)?;

    Ok(rows
        .map(|(offset, cells)| SheetRow {
            row_number: first_row + offset + 1,
            external_id: cell_text(cells.get(id_index)),
            raw_amount: cell_text(cells.get(amount_index)),
        })
        .collect())
}

fn column_index(header: &[Data], name: &str) -> Result<usize, SpreadsheetError> {
    header
        .iter()
        .position(|cell| cell_text(Some(cell)) == name.trim())
        .ok_or_else(|| SpreadsheetError::MissingColumn(name.to_string()))
}

fn is_blank(cells: &[Data]) -> bool {
    cells.iter().all(|c| cell_text(Some(c)).is_empty())
}

/// Renders a cell as trimmed text
pub fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::DateTime(dt)) => dt.as_f64().to_string(),
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => s.trim().to_string(),
        Some(Data::Error(e)) => e.to_string(),
    }
}
