/// `GET /v1/me/dashboard`
///
/// Admins get `{"view":"admin","total_users","total_paid","total_pending"}`;
/// everyone else gets `{"view":"user","today_total","month_total","latest_announcement"}`.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use ctvpay_shared::{
    auth::middleware::CurrentUser,
    dashboard::{build_dashboard, Dashboard},
};

pub async fn get_dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Dashboard>> {
    let today = state.ledger_clock().today();
    let dashboard = build_dashboard(&state.db, &current.user, today).await?;

    Ok(Json(dashboard))
}
