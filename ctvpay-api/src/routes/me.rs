/// Caller's own profile
///
/// - `GET /v1/me` - The resolved profile
/// - `PUT /v1/me/profile` - Replace own profile fields (role is untouched)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use ctvpay_shared::{
    auth::middleware::CurrentUser,
    models::user::{Profile, User},
};
use serde::Deserialize;
use validator::Validate;

/// Profile fields as sent by a client
///
/// Body of `PUT /v1/me/profile`, and nested as `profile` in the admin user
/// requests. Lengths match the `users` columns.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(max = 255, message = "Full name must be at most 255 characters"))]
    #[serde(default)]
    pub full_name: String,

    #[validate(length(max = 255, message = "External ID must be at most 255 characters"))]
    #[serde(default)]
    pub external_id: String,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    #[serde(default)]
    pub phone: String,

    #[validate(length(max = 100, message = "Account number must be at most 100 characters"))]
    #[serde(default)]
    pub bank_account_number: String,

    #[validate(length(max = 255, message = "Account holder must be at most 255 characters"))]
    #[serde(default)]
    pub bank_account_holder: String,

    #[validate(length(max = 255, message = "Bank name must be at most 255 characters"))]
    #[serde(default)]
    pub bank_name: String,
}

impl From<ProfileInput> for Profile {
    fn from(req: ProfileInput) -> Self {
        Profile {
            full_name: req.full_name,
            external_id: req.external_id,
            phone: req.phone,
            bank_account_number: req.bank_account_number,
            bank_account_holder: req.bank_account_holder,
            bank_name: req.bank_name,
        }
        .trimmed()
    }
}

pub async fn get_me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ProfileInput>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let profile = Profile::from(req);
    let user = User::update_profile(&state.db, current.id(), &profile)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Profile not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(user))
}
