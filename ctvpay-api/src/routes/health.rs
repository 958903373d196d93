/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "change_stream": { "backend": "redis", "status": "connected" },
///   "pool": { "size": 4, "idle": 3 },
///   "active_feeds": 2
/// }
/// ```
///
/// Always answers 200; `status` is `degraded` when a dependency is down.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use ctvpay_shared::db::pool::{health_check as db_health_check, pool_stats, PoolStats};
use serde::Serialize;

/// Change stream status
#[derive(Debug, Serialize)]
pub struct ChangeStreamHealth {
    pub backend: &'static str,
    pub status: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub change_stream: ChangeStreamHealth,
    pub pool: PoolStats,
    pub active_feeds: usize,
}

fn connected(ok: bool) -> &'static str {
    if ok {
        "connected"
    } else {
        "disconnected"
    }
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_ok = match db_health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    let changes_ok = match state.changes.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(backend = state.changes.backend(), error = %e, "Change stream health check failed");
            false
        }
    };

    Ok(Json(HealthResponse {
        status: if database_ok && changes_ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: connected(database_ok),
        change_stream: ChangeStreamHealth {
            backend: state.changes.backend(),
            status: connected(changes_ok),
        },
        pool: pool_stats(&state.db),
        active_feeds: state.feeds.active_count(),
    }))
}
