/// User model and database operations
///
/// This module provides the User model and CRUD operations for collaborator and
/// admin accounts. The row id is the identity key: it is the `sub` claim of every
/// token issued for the account.
///
/// Accounts are never hard-deleted. Banning sets the role to [`UserRole::Banned`],
/// which every session and admin check rejects.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('user', 'admin', 'banned');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,             -- unique on lower(email)
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     full_name VARCHAR(255) NOT NULL DEFAULT '',
///     external_id VARCHAR(255) NOT NULL DEFAULT '',
///     phone VARCHAR(50) NOT NULL DEFAULT '',
///     bank_account_number VARCHAR(100) NOT NULL DEFAULT '',
///     bank_account_holder VARCHAR(255) NOT NULL DEFAULT '',
///     bank_name VARCHAR(255) NOT NULL DEFAULT '',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use ctvpay_shared::models::user::{CreateUser, Profile, User, UserRole};
/// use ctvpay_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "ctv@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: UserRole::User,
///     profile: Profile {
///         full_name: "Nguyen Van A".to_string(),
///         external_id: "@nguyenvana".to_string(),
///         ..Default::default()
///     },
/// }).await?;
///
/// let found = User::find_by_external_id(&pool, "@nguyenvana").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Collaborator (CTV) whose salary is tracked
    User,

    /// Portal administrator
    Admin,

    /// Soft-banned account; treated as signed out everywhere
    Banned,
}

impl UserRole {
    /// Converts role to string for display and export
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Banned => "banned",
        }
    }

    /// Whether the role grants access to the admin console
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Whether the account has been banned
    pub fn is_banned(&self) -> bool {
        matches!(self, UserRole::Banned)
    }
}

/// Profile fields editable by the account owner
///
/// Unknown values are stored as empty strings rather than NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    /// Full display name
    #[serde(default)]
    pub full_name: String,

    /// External messaging ID, the join key used by spreadsheet imports
    #[serde(default)]
    pub external_id: String,

    /// Phone number
    #[serde(default)]
    pub phone: String,

    /// Bank account number salaries are paid to
    #[serde(default)]
    pub bank_account_number: String,

    /// Name of the bank account holder
    #[serde(default)]
    pub bank_account_holder: String,

    /// Bank name
    #[serde(default)]
    pub bank_name: String,
}

impl Profile {
    /// Returns a copy with every field trimmed
    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            external_id: self.external_id.trim().to_string(),
            phone: self.phone.trim().to_string(),
            bank_account_number: self.bank_account_number.trim().to_string(),
            bank_account_holder: self.bank_account_holder.trim().to_string(),
            bank_name: self.bank_name.trim().to_string(),
        }
    }
}

/// User model representing a collaborator or admin account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Identity key (UUID v4), also the token subject
    pub id: Uuid,

    /// Email address, stored lowercase
    pub email: String,

    /// Argon2id password hash
    ///
    /// Never serialized into API responses.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Account role
    pub role: UserRole,

    /// Profile fields
    #[sqlx(flatten)]
    pub profile: Profile,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (normalized to lowercase on insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Initial role
    pub role: UserRole,

    /// Initial profile
    pub profile: Profile,
}

/// Input for an admin update
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New role
    pub role: Option<UserRole>,

    /// Replacement profile (all profile fields are replaced together)
    pub profile: Option<Profile>,

    /// New password hash
    pub password_hash: Option<String>,
}

/// Normalizes an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique violation on `users_email_lower_key`)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let profile = data.profile.trimmed();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role, full_name, external_id, phone,
                               bank_account_number, bank_account_holder, bank_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, email, password_hash, role, full_name, external_id, phone,
                      bank_account_number, bank_account_holder, bank_name,
                      created_at, updated_at
            "#,
        )
        .bind(normalize_email(&data.email))
        .bind(data.password_hash)
        .bind(data.role)
        .bind(profile.full_name)
        .bind(profile.external_id)
        .bind(profile.phone)
        .bind(profile.bank_account_number)
        .bind(profile.bank_account_holder)
        .bind(profile.bank_name)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    ///
    /// # Returns
    ///
    /// The user if found, None otherwise
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, full_name, external_id, phone,
                   bank_account_number, bank_account_holder, bank_name,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, full_name, external_id, phone,
                   bank_account_number, bank_account_holder, bank_name,
                   created_at, updated_at
            FROM users
            WHERE lower(email) = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds the user owning an external messaging ID
    ///
    /// External IDs are not unique. When several accounts share one, the oldest
    /// account wins so repeated imports resolve to the same owner.
    pub async fn find_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, full_name, external_id, phone,
                   bank_account_number, bank_account_holder, bank_name,
                   created_at, updated_at
            FROM users
            WHERE external_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Lists users ordered by full name, one page at a time
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, full_name, external_id, phone,
                   bank_account_number, bank_account_holder, bank_name,
                   created_at, updated_at
            FROM users
            ORDER BY full_name ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Lists every user ordered by full name
    ///
    /// Used by the directory export, which is a full snapshot.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, full_name, external_id, phone,
                   bank_account_number, bank_account_holder, bank_name,
                   created_at, updated_at
            FROM users
            ORDER BY full_name ASC, id ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Lists every user with the given role, ordered by full name
    pub async fn list_by_role(pool: &PgPool, role: UserRole) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, full_name, external_id, phone,
                   bank_account_number, bank_account_holder, bank_name,
                   created_at, updated_at
            FROM users
            WHERE role = $1
            ORDER BY full_name ASC, id ASC
            "#,
        )
        .bind(role)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Replaces the profile fields of a user
    ///
    /// This is the only write an account owner may perform on their own record;
    /// role and credentials are untouched.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if user doesn't exist
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        profile: &Profile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile = profile.trimmed();

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = $2, external_id = $3, phone = $4,
                bank_account_number = $5, bank_account_holder = $6, bank_name = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, role, full_name, external_id, phone,
                      bank_account_number, bank_account_holder, bank_name,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(profile.full_name)
        .bind(profile.external_id)
        .bind(profile.phone)
        .bind(profile.bank_account_number)
        .bind(profile.bank_account_holder)
        .bind(profile.bank_name)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Applies an admin update
    ///
    /// Only non-None fields in `data` are written. The `updated_at` timestamp
    /// is always refreshed.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile = data.profile.map(|p| p.trimmed());
        let field = |f: fn(&Profile) -> &String| profile.as_ref().map(|p| f(p).clone());

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                password_hash = COALESCE($3, password_hash),
                full_name = COALESCE($4, full_name),
                external_id = COALESCE($5, external_id),
                phone = COALESCE($6, phone),
                bank_account_number = COALESCE($7, bank_account_number),
                bank_account_holder = COALESCE($8, bank_account_holder),
                bank_name = COALESCE($9, bank_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, role, full_name, external_id, phone,
                      bank_account_number, bank_account_holder, bank_name,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.role)
        .bind(data.password_hash)
        .bind(field(|p| &p.full_name))
        .bind(field(|p| &p.external_id))
        .bind(field(|p| &p.phone))
        .bind(field(|p| &p.bank_account_number))
        .bind(field(|p| &p.bank_account_holder))
        .bind(field(|p| &p.bank_name))
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Soft-bans a user
    ///
    /// Sets the role to `banned`. The account row and its salary history stay.
    ///
    /// # Returns
    ///
    /// The banned user if found, None otherwise
    pub async fn ban(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        Self::update(
            pool,
            id,
            UpdateUser {
                role: Some(UserRole::Banned),
                ..Default::default()
            },
        )
        .await
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
