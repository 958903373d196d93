/// Caller's salary feed
///
/// - `GET /v1/me/salaries?after=<cursor>` - One page of 20 records
/// - `GET /v1/me/salaries/stream?view=<id>` - Live window over SSE
///
/// # SSE Event Format
///
/// ```text
/// event: snapshot
/// data: {"changes":[{"type":"added","new_index":0,"record":{...}}],"size":1,"cursor":"...","has_more":false}
///
/// event: error
/// data: Change stream error: ...
/// ```
///
/// A keep-alive comment is sent every 25 seconds.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use ctvpay_shared::{
    auth::middleware::CurrentUser,
    feed::{load_page, subscribe, window::FeedCursor, window::SalaryPage, FeedEvent},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt as _;

/// View id used when the client does not send one
pub const DEFAULT_VIEW: &str = "default";

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Cursor from a previous page or snapshot
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub view: Option<String>,
}

/// Load-more page
///
/// Without `after` this returns the newest page.
pub async fn list_salaries(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<SalaryPage>> {
    let cursor = query
        .after
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::parse::<FeedCursor>)
        .transpose()?;

    let page = load_page(state.windows.as_ref(), current.id(), cursor.as_ref()).await?;

    tracing::debug!(
        user_id = %current.id(),
        records = page.records.len(),
        has_more = page.has_more,
        "Loaded salary page"
    );

    Ok(Json(page))
}

fn to_sse(event: FeedEvent) -> Event {
    match event {
        FeedEvent::Snapshot(snapshot) => match Event::default().event("snapshot").json_data(&snapshot) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode feed snapshot");
                Event::default().event("error").data("Failed to encode snapshot")
            }
        },
        FeedEvent::Error(message) => Event::default().event("error").data(message),
    }
}

/// Live window subscription
///
/// Opening a view cancels any earlier subscription of the same caller for the
/// same view id. Closing the connection ends the subscription.
pub async fn stream_salaries(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let view = query
        .view
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VIEW.to_string());

    tracing::info!(user_id = %current.id(), view = %view, "Opening salary feed");

    let subscription = subscribe(
        &state.feeds,
        state.changes.clone(),
        state.windows.clone(),
        current.id(),
        &view,
        state.feed_config,
    );

    let stream = subscription.map(|event| Ok::<_, Infallible>(to_sse(event)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(25)))
}
