/// Role checks for the admin console
///
/// The session loader already rejects banned accounts, so by the time these
/// checks run the caller is either a collaborator or an admin. The checks still
/// treat `banned` as a failure on their own.
///
/// # Example
///
/// ```no_run
/// use ctvpay_shared::auth::authorization::require_admin;
/// use ctvpay_shared::auth::middleware::CurrentUser;
///
/// fn export(current: &CurrentUser) -> Result<(), Box<dyn std::error::Error>> {
///     require_admin(current)?;
///     Ok(())
/// }
/// ```

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::middleware::{AuthError, CurrentUser};
use crate::models::user::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller is not an admin
    #[error("Admin access required")]
    NotAdmin,

    /// Caller's account is banned
    #[error("Account is banned")]
    Banned,

    /// An admin tried to ban their own account
    #[error("You cannot ban your own account")]
    SelfBan,

    /// An admin tried to drop their own admin role
    #[error("You cannot remove your own admin role")]
    SelfDemotion,
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let body = json!({ "error": "forbidden", "message": self.to_string() });
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    }
}

/// Whether a role passes the admin check
pub fn is_admin_role(role: UserRole) -> bool {
    role.is_admin()
}

/// Requires the caller to be an admin
pub fn require_admin(current: &CurrentUser) -> Result<(), AuthzError> {
    match current.role() {
        UserRole::Admin => Ok(()),
        UserRole::Banned => Err(AuthzError::Banned),
        UserRole::User => Err(AuthzError::NotAdmin),
    }
}

/// Rejects an admin action that targets the acting admin's own account
pub fn require_not_self(current: &CurrentUser, target: Uuid) -> Result<(), AuthzError> {
    if current.id() == target {
        return Err(AuthzError::SelfBan);
    }

    Ok(())
}

/// Rejects a role change that would ban or demote the acting admin
pub fn require_role_change_allowed(
    current: &CurrentUser,
    target: Uuid,
    new_role: UserRole,
) -> Result<(), AuthzError> {
    match new_role {
        UserRole::Admin => Ok(()),
        UserRole::Banned => require_not_self(current, target),
        UserRole::User if current.id() == target => Err(AuthzError::SelfDemotion),
        UserRole::User => Ok(()),
    }
}

/// Middleware that requires an admin session
///
/// Must run after [`require_session`](super::middleware::require_session).
pub async fn require_admin_layer(req: Request, next: Next) -> Response {
    let Some(current) = req.extensions().get::<CurrentUser>() else {
        return AuthError::MissingCredentials.into_response();
    };

    if let Err(e) = require_admin(current) {
        tracing::warn!(user_id = %current.id(), "Admin route refused");
        return e.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::tests::user;

    fn current(role: UserRole) -> CurrentUser {
        CurrentUser { user: user(role) }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&current(UserRole::Admin)).is_ok());
        assert!(matches!(require_admin(&current(UserRole::User)), Err(AuthzError::NotAdmin)));
        assert!(matches!(require_admin(&current(UserRole::Banned)), Err(AuthzError::Banned)));
    }

    #[test]
    fn test_banned_fails_every_admin_check() {
        assert!(!is_admin_role(UserRole::Banned));
        assert!(require_admin(&current(UserRole::Banned)).is_err());
    }

    #[test]
    fn test_require_not_self() {
        let admin = current(UserRole::Admin);
        assert!(matches!(require_not_self(&admin, admin.id()), Err(AuthzError::SelfBan)));
        assert!(require_not_self(&admin, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_role_change_on_own_account() {
        let admin = current(UserRole::Admin);
        let me = admin.id();

        assert!(matches!(
            require_role_change_allowed(&admin, me, UserRole::Banned),
            Err(AuthzError::SelfBan)
        ));
        assert!(matches!(
            require_role_change_allowed(&admin, me, UserRole::User),
            Err(AuthzError::SelfDemotion)
        ));
        assert!(require_role_change_allowed(&admin, me, UserRole::Admin).is_ok());

        let other = Uuid::new_v4();
        assert!(require_role_change_allowed(&admin, other, UserRole::Banned).is_ok());
        assert!(require_role_change_allowed(&admin, other, UserRole::User).is_ok());
    }

    #[test]
    fn test_into_response() {
        assert_eq!(AuthzError::NotAdmin.into_response().status(), StatusCode::FORBIDDEN);
    }
}
