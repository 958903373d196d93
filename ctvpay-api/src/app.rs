/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use ctvpay_api::{app::AppState, config::Config};
/// use ctvpay_shared::changes::local::LocalChangeStream;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, Arc::new(LocalChangeStream::new()));
/// let app = ctvpay_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use ctvpay_shared::{
    auth::{
        authorization::require_admin_layer,
        guard::GuardPaths,
        middleware::{require_session, SessionLoader},
    },
    changes::ChangeNotifier,
    dashboard::LedgerClock,
    feed::{FeedConfig, FeedRegistry, WindowSource},
    import::ImportColumns,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Largest accepted import upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Change notices for live feeds
    pub changes: Arc<dyn ChangeNotifier>,

    /// Active feed subscriptions
    pub feeds: Arc<FeedRegistry>,

    /// Resolves bearer tokens to users
    pub sessions: SessionLoader,

    /// Feed queries
    pub windows: Arc<dyn WindowSource>,

    pub feed_config: FeedConfig,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config, changes: Arc<dyn ChangeNotifier>) -> Self {
        let sessions = SessionLoader::new(db.clone(), &config.jwt.secret);

        Self {
            windows: Arc::new(db.clone()),
            db,
            config: Arc::new(config),
            changes,
            feeds: Arc::new(FeedRegistry::new()),
            sessions,
            feed_config: FeedConfig::default(),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn guard_paths(&self) -> GuardPaths {
        GuardPaths {
            login: self.config.portal.login_path.clone(),
            home: self.config.portal.home_path.clone(),
        }
    }

    pub fn import_columns(&self) -> ImportColumns {
        ImportColumns {
            id_column: self.config.import.id_column.clone(),
            amount_column: self.config.import.amount_column.clone(),
        }
    }

    pub fn ledger_clock(&self) -> LedgerClock {
        LedgerClock::with_offset_minutes(self.config.portal.ledger_utc_offset_minutes)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /health                                 public
/// /v1/auth/login, /v1/auth/refresh        public
/// /v1/session/guard                       public (optional bearer token)
/// /v1/me, /v1/me/profile                  session
/// /v1/me/salaries, /v1/me/salaries/stream session
/// /v1/me/dashboard                        session
/// /v1/announcements/latest                session
/// /v1/admin/...                           session + admin
/// ```
///
/// Middleware, outermost first: security headers, CORS, tracing.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let session_routes = Router::new().route("/guard", get(routes::session::guard));

    let session_layer =
        axum::middleware::from_fn_with_state(state.sessions.clone(), require_session);

    let me_routes = Router::new()
        .route("/", get(routes::me::get_me))
        .route("/profile", put(routes::me::update_profile))
        .route("/salaries", get(routes::salaries::list_salaries))
        .route("/salaries/stream", get(routes::salaries::stream_salaries))
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .layer(session_layer.clone());

    let announcement_routes = Router::new()
        .route("/latest", get(routes::announcements::latest))
        .layer(session_layer.clone());

    let admin_routes = Router::new()
        .route(
            "/users",
            get(routes::admin_users::list_users).post(routes::admin_users::create_user),
        )
        .route("/users/export", get(routes::admin_users::export_users))
        .route("/users/:id", put(routes::admin_users::update_user))
        .route("/users/:id/ban", post(routes::admin_users::ban_user))
        .route("/collaborators", get(routes::admin_users::list_collaborators))
        .route("/salaries", post(routes::admin_salaries::create_salary))
        .route(
            "/salaries/import",
            post(routes::admin_salaries::import_salaries)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/salaries/:id", patch(routes::admin_salaries::update_status))
        .layer(axum::middleware::from_fn(require_admin_layer))
        .layer(session_layer);

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/session", session_routes)
        .nest("/me", me_routes)
        .nest("/announcements", announcement_routes)
        .nest("/admin", admin_routes);

    let cors = if state.config.cors_allows_any() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
