/// Session loading for Axum
///
/// Every protected request goes through the session loader: the Bearer token is
/// validated, its subject is resolved to a user row, and the result is stored in
/// the request extensions as a [`CurrentUser`]. Handlers take `CurrentUser` as an
/// extractor.
///
/// A token whose user no longer exists is rejected with 401 "Profile not found".
/// A banned user is rejected with 403 no matter how valid the token is.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use ctvpay_shared::auth::middleware::{require_session, CurrentUser, SessionLoader};
/// use sqlx::PgPool;
///
/// async fn me(current: CurrentUser) -> String {
///     current.user.profile.full_name
/// }
///
/// fn router(pool: PgPool) -> Router {
///     let loader = SessionLoader::new(pool, "jwt-secret-of-at-least-thirty-two-bytes");
///     Router::new()
///         .route("/me", get(me))
///         .layer(middleware::from_fn_with_state(loader, require_session))
/// }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{Profile, User, UserRole};

/// The authenticated caller, resolved from the token subject
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn profile(&self) -> &Profile {
        &self.user.profile
    }

    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Error type for session loading
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Expected Bearer token")]
    InvalidFormat,

    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but no user row exists for its subject
    #[error("Profile not found")]
    ProfileNotFound,

    #[error("Account is banned")]
    Banned,

    #[error("Database error: {0}")]
    Database(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::InvalidToken(_)
            | AuthError::ProfileNotFound => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::Banned => StatusCode::FORBIDDEN,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::INTERNAL_SERVER_ERROR => "internal_error",
            _ => "unauthorized",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Database(detail) => {
                tracing::error!(error = %detail, "Session lookup failed");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "error": self.code(), "message": message });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

/// Where the session loader reads user rows from
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;
}

#[async_trait]
impl ProfileSource for PgPool {
    async fn load_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        User::find_by_id(self, id).await
    }
}

/// Extracts the Bearer token from request headers
///
/// Returns `Ok(None)` when no Authorization header is present.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)?;

    Ok(Some(token))
}

/// Resolves tokens to users
#[derive(Clone)]
pub struct SessionLoader {
    profiles: Arc<dyn ProfileSource>,
    secret: Arc<str>,
}

impl SessionLoader {
    pub fn new(pool: PgPool, secret: impl AsRef<str>) -> Self {
        Self::with_source(Arc::new(pool), secret)
    }

    pub fn with_source(profiles: Arc<dyn ProfileSource>, secret: impl AsRef<str>) -> Self {
        Self {
            profiles,
            secret: Arc::from(secret.as_ref()),
        }
    }

    /// Validates an access token and loads its user
    pub async fn load(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let claims = validate_access_token(token, &self.secret)?;

        let user = self
            .profiles
            .load_user(claims.sub)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::ProfileNotFound)?;

        if user.role.is_banned() {
            tracing::info!(user_id = %user.id, "Rejected session for banned account");
            return Err(AuthError::Banned);
        }

        Ok(CurrentUser { user })
    }

    /// Loads the session named by the request headers
    pub async fn load_from_headers(&self, headers: &HeaderMap) -> Result<CurrentUser, AuthError> {
        let token = bearer_token(headers)?.ok_or(AuthError::MissingCredentials)?;
        self.load(token).await
    }

    /// Like [`load_from_headers`](Self::load_from_headers) but treats every
    /// failure except a database error as "signed out"
    pub async fn load_optional(&self, headers: &HeaderMap) -> Result<Option<CurrentUser>, AuthError> {
        match self.load_from_headers(headers).await {
            Ok(current) => Ok(Some(current)),
            Err(AuthError::Database(e)) => Err(AuthError::Database(e)),
            Err(_) => Ok(None),
        }
    }
}

/// Middleware that requires a valid session
pub async fn require_session(
    State(loader): State<SessionLoader>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let current = loader.load_from_headers(req.headers()).await?;
    req.extensions_mut().insert(current);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}
