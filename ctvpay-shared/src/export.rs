//! User directory export
//!
//! Renders the directory as an xlsx workbook with a single `Collaborators`
//! sheet. Rows keep the order they are given in (callers pass users ordered by
//! full name).

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::models::user::User;

/// Worksheet name
pub const SHEET_NAME: &str = "Collaborators";

/// Column headers, in order
pub const HEADERS: [&str; 7] = [
    "Full Name",
    "Email",
    "External ID",
    "Role",
    "Account Number",
    "Account Holder",
    "Bank",
];

/// Export failures
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to build workbook: {0}")]
    Workbook(#[from] XlsxError),
}

/// Builds the directory workbook and returns its bytes
pub fn export_directory(users: &[User]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        sheet.set_column_width(col as u16, 22)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (i, user) in users.iter().enumerate() {
        let row = (i + 1) as u32;
        let p = &user.profile;
        let cells = [
            p.full_name.as_str(),
            user.email.as_str(),
            p.external_id.as_str(),
            user.role.as_str(),
            p.bank_account_number.as_str(),
            p.bank_account_holder.as_str(),
            p.bank_name.as_str(),
        ];
        for (col, value) in cells.iter().enumerate() {
            sheet.write_string(row, col as u16, *value)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::debug!(users = users.len(), bytes = bytes.len(), "Exported user directory");

    Ok(bytes)
}

/// Download file name for an export made on `date`
pub fn export_file_name(date: chrono::NaiveDate) -> String {
    format!("collaborators-{}.xlsx", date.format("%Y-%m-%d"))
}
