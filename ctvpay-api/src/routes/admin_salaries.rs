/// Salary ledger administration (admin only)
///
/// - `POST  /v1/admin/salaries` - Manual single entry
/// - `POST  /v1/admin/salaries/import` - Spreadsheet import (multipart field `file`)
/// - `PATCH /v1/admin/salaries/:id` - Status change
///
/// Every committed write publishes a change notice to the affected owners so
/// their live feeds refresh.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use ctvpay_shared::{
    auth::middleware::CurrentUser,
    changes::{notify_owners, ChangeReason},
    import::{import_salaries as run_import, ImportOptions, ImportReport},
    models::{
        salary::{NewSalary, Salary, SalaryMethod, SalaryStatus},
        user::User,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Multipart field carrying the spreadsheet
pub const UPLOAD_FIELD: &str = "file";

/// Manual entry body
///
/// The amount is taken as-is (no import scaling).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSalaryRequest {
    pub user_id: Uuid,

    #[validate(range(min = 0, message = "Amount must not be negative"))]
    pub amount: i64,

    /// Calendar day, `YYYY-MM-DD`
    pub date: NaiveDate,

    pub status: SalaryStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: SalaryStatus,
}

pub async fn create_salary(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateSalaryRequest>,
) -> ApiResult<(StatusCode, Json<Salary>)> {
    req.validate()?;

    let owner = User::find_by_id(&state.db, req.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let salary = Salary::create(
        &state.db,
        NewSalary {
            user_id: owner.id,
            user_name: owner.profile.full_name,
            external_id: owner.profile.external_id,
            amount: req.amount,
            date: req.date,
            status: req.status,
            method: SalaryMethod::Manual,
            added_by: current.id(),
        },
    )
    .await?;

    tracing::info!(
        admin_id = %current.id(),
        salary_id = %salary.id,
        user_id = %salary.user_id,
        amount = salary.amount,
        "Salary recorded"
    );

    notify_owners(&state.changes, &[salary.user_id], ChangeReason::SalaryCreated).await;

    Ok((StatusCode::CREATED, Json(salary)))
}

/// Reads the upload field into memory
async fn read_upload(mut multipart: Multipart) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::invalid_field(UPLOAD_FIELD, "A spreadsheet file is required"))
}

/// Spreadsheet import
///
/// Row failures are part of the report. File-level problems answer 400 and a
/// failed batch write answers 500; nothing is written in either case.
pub async fn import_salaries(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> ApiResult<Json<ImportReport>> {
    let bytes = read_upload(multipart).await?;

    let options = ImportOptions {
        columns: state.import_columns(),
        amount_scale: state.config.import.amount_scale,
        date: state.ledger_clock().today(),
        added_by: current.id(),
    };

    tracing::info!(admin_id = %current.id(), bytes = bytes.len(), "Salary import started");

    let report = run_import(bytes, &options, &state.db, &state.db).await?;

    let owners: Vec<Uuid> = report.records.iter().map(|r| r.user_id).collect();
    notify_owners(&state.changes, &owners, ChangeReason::SalaryImported).await;

    Ok(Json(report))
}

pub async fn update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Salary>> {
    let salary = Salary::update_status(&state.db, id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Salary record not found".to_string()))?;

    tracing::info!(
        admin_id = %current.id(),
        salary_id = %salary.id,
        status = salary.status.as_str(),
        "Salary status changed"
    );

    notify_owners(&state.changes, &[salary.user_id], ChangeReason::SalaryStatusChanged).await;

    Ok(Json(salary))
}
