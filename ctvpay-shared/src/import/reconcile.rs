/// Row reconciliation and batch commit for salary imports
///
/// Rows are processed one at a time in file order. Each row either stages a
/// salary record or produces a [`RowFailure`]; row failures never abort the
/// import. Staged records are written in one all-or-nothing batch.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::amount::normalize_amount;
use super::spreadsheet::{read_rows, ImportColumns, SheetRow, SpreadsheetError};
use crate::models::salary::{NewSalary, Salary, SalaryMethod, SalaryStatus};
use crate::models::user::User;

/// Looks collaborators up by external messaging ID
#[async_trait]
pub trait CollaboratorDirectory: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, sqlx::Error>;
}

#[async_trait]
impl CollaboratorDirectory for PgPool {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, sqlx::Error> {
        User::find_by_external_id(self, external_id).await
    }
}

/// Writes staged records
#[async_trait]
pub trait SalaryLedger: Send + Sync {
    /// Persists every record or none
    async fn insert_batch(&self, batch: &[NewSalary]) -> Result<Vec<Salary>, sqlx::Error>;
}

#[async_trait]
impl SalaryLedger for PgPool {
    async fn insert_batch(&self, batch: &[NewSalary]) -> Result<Vec<Salary>, sqlx::Error> {
        Salary::insert_batch(self, batch).await
    }
}

/// Machine-readable reason a row was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailureReason {
    MissingIdOrAmount,
    InvalidAmount,
    NoMatchingCollaborator,
}

/// A skipped row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based worksheet row number
    pub row: usize,
    pub reason: RowFailureReason,
    pub message: String,
}

/// Outcome of an import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<RowFailure>,
    pub records: Vec<Salary>,
}

/// Import settings for one run
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub columns: ImportColumns,

    /// Multiplier applied to spreadsheet amounts
    pub amount_scale: i64,

    /// Date stamped on every record (the day the import runs)
    pub date: NaiveDate,

    /// Admin running the import
    pub added_by: Uuid,
}

/// Import-level failures; nothing was persisted
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("collaborator lookup failed: {0}")]
    Lookup(#[source] sqlx::Error),

    #[error("failed to save salary batch: {0}")]
    BatchWrite(#[source] sqlx::Error),
}

impl ImportError {
    /// Whether the failure was caused by the uploaded file rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, ImportError::Spreadsheet(_))
    }
}

/// Rows that passed reconciliation plus the rows that did not
#[derive(Debug, Default)]
pub struct Reconciled {
    pub staged: Vec<NewSalary>,
    pub failures: Vec<RowFailure>,
}

/// Validates rows and matches them to collaborators
///
/// A directory error aborts the whole import.
pub async fn reconcile_rows(
    rows: &[SheetRow],
    options: &ImportOptions,
    directory: &dyn CollaboratorDirectory,
) -> Result<Reconciled, ImportError> {
    let mut out = Reconciled::default();

    for row in rows {
        let fail = |reason, message: String| RowFailure {
            row: row.row_number,
            reason,
            message,
        };

        if row.external_id.is_empty() || row.raw_amount.trim().is_empty() {
            out.failures.push(fail(
                RowFailureReason::MissingIdOrAmount,
                format!("Row {}: missing ID or amount", row.row_number),
            ));
            continue;
        }

        let amount = match normalize_amount(&row.raw_amount, options.amount_scale) {
            Ok(amount) => amount,
            Err(e) => {
                tracing::debug!(row = row.row_number, raw = %row.raw_amount, error = %e, "Rejected amount");
                out.failures.push(fail(
                    RowFailureReason::InvalidAmount,
                    format!(
                        "Row {}: invalid amount \"{}\" for {}",
                        row.row_number, row.raw_amount, row.external_id
                    ),
                ));
                continue;
            }
        };

        let Some(user) = directory
            .find_by_external_id(&row.external_id)
            .await
            .map_err(ImportError::Lookup)?
        else {
            out.failures.push(fail(
                RowFailureReason::NoMatchingCollaborator,
                format!(
                    "Row {}: no matching collaborator for ID {}",
                    row.row_number, row.external_id
                ),
            ));
            continue;
        };

        out.staged.push(NewSalary {
            user_id: user.id,
            user_name: user.profile.full_name,
            external_id: user.profile.external_id,
            amount,
            date: options.date,
            status: SalaryStatus::Pending,
            method: SalaryMethod::SpreadsheetImport,
            added_by: options.added_by,
        });
    }

    Ok(out)
}

/// Runs a full import: read, reconcile, commit
///
/// The uploaded bytes are consumed by the call.
pub async fn import_salaries(
    bytes: Vec<u8>,
    options: &ImportOptions,
    directory: &dyn CollaboratorDirectory,
    ledger: &dyn SalaryLedger,
) -> Result<ImportReport, ImportError> {
    let rows = read_rows(bytes, &options.columns)?;
    let total = rows.len();

    let Reconciled { staged, failures } = reconcile_rows(&rows, options, directory).await?;
    drop(rows);

    let records = if staged.is_empty() {
        Vec::new()
    } else {
        ledger.insert_batch(&staged).await.map_err(ImportError::BatchWrite)?
    };

    tracing::info!(
        admin_id = %options.added_by,
        total,
        succeeded = staged.len(),
        failed = failures.len(),
        "Salary import finished"
    );

    Ok(ImportReport {
        total,
        succeeded: staged.len(),
        failed: failures.len(),
        failures,
        records,
    })
}
