/// Navigation guard endpoint
///
/// ```text
/// GET /v1/session/guard?page=login|protected
/// Authorization: Bearer <token>   (optional)
/// ```
///
/// Answers `{"action":"allow"}` or `{"action":"redirect","location":"/login/"}`.
/// A missing, invalid or banned session counts as signed out.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use ctvpay_shared::auth::guard::{decide, NavigationDecision, Page};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GuardQuery {
    pub page: Page,
}

pub async fn guard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GuardQuery>,
) -> ApiResult<Json<NavigationDecision>> {
    let signed_in = state.sessions.load_optional(&headers).await?.is_some();

    Ok(Json(decide(query.page, signed_in, &state.guard_paths())))
}
