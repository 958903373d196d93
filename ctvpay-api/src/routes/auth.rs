/// Authentication endpoints
///
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
///
/// Accounts are created by admins; there is no self-registration.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use ctvpay_shared::{
    auth::{jwt, password},
    models::user::{normalize_email, User},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: jwt::TokenPair,

    /// The signed-in account
    pub user: User,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Login endpoint
///
/// ```text
/// POST /v1/auth/login
/// { "email": "ctv@example.com", "password": "secret1" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (same message for both)
/// - `403 Forbidden`: Account is banned
/// - `422 Unprocessable Entity`: Malformed email
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let email = normalize_email(&req.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if user.role.is_banned() {
        tracing::info!(user_id = %user.id, "Login rejected: account banned");
        return Err(ApiError::Forbidden("Account is banned".to_string()));
    }

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User signed in");

    Ok(Json(LoginResponse { tokens, user }))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token. The account must still
/// exist and not be banned.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let (access_token, claims) = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Profile not found".to_string()))?;
    if user.role.is_banned() {
        return Err(ApiError::Forbidden("Account is banned".to_string()));
    }

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: claims.expires_in(),
    }))
}
