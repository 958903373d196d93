/// User directory administration (admin only)
///
/// - `GET  /v1/admin/users?limit&offset` - Page of users ordered by full name
/// - `GET  /v1/admin/collaborators` - Picker entries for manual salary entry
/// - `POST /v1/admin/users` - Create an account
/// - `PUT  /v1/admin/users/:id` - Update role, profile or password
/// - `POST /v1/admin/users/:id/ban` - Soft-ban
/// - `GET  /v1/admin/users/export` - Directory as an xlsx workbook

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::me::ProfileInput,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use ctvpay_shared::{
    auth::{
        authorization::{require_not_self, require_role_change_allowed},
        middleware::CurrentUser,
        password,
    },
    export::{export_directory, export_file_name},
    models::user::{normalize_email, CreateUser, UpdateUser, User, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    /// Limit clamped to `1..=MAX_PAGE_LIMIT` and a non-negative offset
    pub fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Entry in the manual-entry picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaboratorOption {
    pub id: Uuid,
    pub full_name: String,
    pub external_id: String,
}

impl From<User> for CollaboratorOption {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.profile.full_name,
            external_id: user.profile.external_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,

    pub password: String,

    #[serde(default = "default_role")]
    pub role: UserRole,

    #[validate(nested)]
    #[serde(default)]
    pub profile: ProfileInput,
}

fn default_role() -> UserRole {
    UserRole::User
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,

    #[validate(nested)]
    pub profile: Option<ProfileInput>,

    /// New password; resets the stored hash
    pub password: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<UserList>> {
    let (limit, offset) = query.bounds();
    let users = User::list(&state.db, limit, offset).await?;
    let total = User::count(&state.db).await?;

    Ok(Json(UserList {
        users,
        total,
        limit,
        offset,
    }))
}

pub async fn list_collaborators(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CollaboratorOption>>> {
    let users = User::list_by_role(&state.db, UserRole::User).await?;

    Ok(Json(users.into_iter().map(CollaboratorOption::from).collect()))
}

/// Creates an account
///
/// Identity and profile are one row, written in a single statement.
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Invalid email or weak password
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;
    password::validate_password(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;
    let user = User::create(
        &state.db,
        CreateUser {
            email: normalize_email(&req.email),
            password_hash,
            role: req.role,
            profile: req.profile.into(),
        },
    )
    .await?;

    tracing::info!(
        admin_id = %current.id(),
        user_id = %user.id,
        role = user.role.as_str(),
        "User created"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates role, profile or password
///
/// # Errors
///
/// - `403 Forbidden`: The admin tried to ban or demote their own account
/// - `404 Not Found`: Unknown user
/// - `422 Unprocessable Entity`: Profile field too long or weak password
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    if let Some(role) = req.role {
        require_role_change_allowed(&current, id, role)?;
    }

    let password_hash = match req.password.as_deref() {
        Some(new_password) => {
            password::validate_password(new_password)?;
            Some(password::hash_password(new_password)?)
        }
        None => None,
    };

    let user = User::update(
        &state.db,
        id,
        UpdateUser {
            role: req.role,
            profile: req.profile.map(Into::into),
            password_hash,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(admin_id = %current.id(), user_id = %id, "User updated");

    Ok(Json(user))
}

/// Soft-bans an account
///
/// # Errors
///
/// - `403 Forbidden`: The admin targeted their own account
/// - `404 Not Found`: Unknown user
pub async fn ban_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    require_not_self(&current, id)?;

    let user = User::ban(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::warn!(admin_id = %current.id(), user_id = %id, "User banned");

    Ok(Json(user))
}

pub async fn export_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let users = User::list_all(&state.db).await?;
    let bytes = export_directory(&users)?;
    let file_name = export_file_name(state.ledger_clock().today());

    tracing::info!(admin_id = %current.id(), users = users.len(), "Directory exported");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}
