/// Latest announcement with an unread indicator
///
/// ```text
/// GET /v1/announcements/latest?last_seen=<uuid>
/// ```
///
/// ```json
/// { "announcement": { "id": "...", "title": "...", "content": "...", "created_at": "..." }, "has_unread": true }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use ctvpay_shared::models::announcement::Announcement;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    /// Id of the last announcement the client showed
    pub last_seen: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub announcement: Option<Announcement>,
    pub has_unread: bool,
}

impl LatestResponse {
    pub fn new(announcement: Option<Announcement>, last_seen: Option<Uuid>) -> Self {
        let has_unread = announcement
            .as_ref()
            .is_some_and(|a| a.is_unread_for(last_seen));

        Self {
            announcement,
            has_unread,
        }
    }
}

pub async fn latest(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<LatestResponse>> {
    let announcement = Announcement::find_latest(&state.db).await?;

    Ok(Json(LatestResponse::new(announcement, query.last_seen)))
}
