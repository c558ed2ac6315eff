//! User accounts, roles, and credential checks.
//!
//! Passwords are stored as argon2id PHC strings. Unknown emails and wrong
//! passwords produce the same error so the login endpoint does not reveal
//! which accounts exist.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::services::{activity, session};

const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Student => "student",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    /// Parse a role read from the database.
    ///
    /// # Errors
    ///
    /// Returns a decode error for values outside the schema's check constraint.
    pub fn decode(value: &str) -> Result<Self, sqlx::Error> {
        Self::parse(value).ok_or_else(|| sqlx::Error::Decode(format!("unknown role: {value}").into()))
    }

    /// Whether this role may act with at least `required`'s privileges.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        match required {
            Self::SuperAdmin => self == Self::SuperAdmin,
            Self::Admin => matches!(self, Self::SuperAdmin | Self::Admin),
            Self::Student => self == Self::Student,
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be at least 8 characters")]
    WeakPassword,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("cannot demote, deactivate, or delete your own account")]
    SelfModification,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

const USER_COLUMNS: &str = "id, email, name, role, is_active, created_at";

fn row_to_user(row: &PgRow) -> Result<UserRow, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(UserRow {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: Role::decode(&role)?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

// =============================================================================
// VALIDATION + HASHING
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => Some(normalized),
        _ => None,
    }
}

/// Hash a password into an argon2id PHC string.
///
/// # Errors
///
/// Returns an error if the password is too short or hashing fails.
pub fn hash_password(password: &str) -> Result<String, UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::WeakPassword);
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Hash(e.to_string()))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Verify login credentials and return the matching active user.
///
/// # Errors
///
/// Returns `InvalidCredentials` for unknown, inactive, or mismatched accounts.
pub async fn verify_credentials(pool: &PgPool, email: &str, password: &str) -> Result<UserRow, UserError> {
    let normalized = normalize_email(email).ok_or(UserError::InvalidCredentials)?;
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"))
        .bind(&normalized)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::InvalidCredentials)?;

    let stored_hash: String = row.try_get("password_hash")?;
    let user = row_to_user(&row)?;
    if !user.is_active || !verify_password(password, &stored_hash) {
        return Err(UserError::InvalidCredentials);
    }
    Ok(user)
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a user account. `actor_id` is the admin creating it; the creation
/// is logged in the same transaction. Bootstrap and seeding pass `None`.
///
/// # Errors
///
/// Returns validation errors, `EmailTaken` on duplicate email, or a database error.
pub async fn create_user(pool: &PgPool, actor_id: Option<Uuid>, new_user: &NewUser) -> Result<UserRow, UserError> {
    let email = normalize_email(&new_user.email).ok_or(UserError::InvalidEmail)?;
    let password_hash = hash_password(&new_user.password)?;
    let name = new_user.name.trim();

    let mut tx = pool.begin().await?;
    let row = sqlx::query(&format!(
        "INSERT INTO users (email, name, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    ))
    .bind(&email)
    .bind(if name.is_empty() { email.as_str() } else { name })
    .bind(&password_hash)
    .bind(new_user.role.as_str())
    .fetch_one(tx.as_mut())
    .await
    .map_err(|e| if is_unique_violation(&e) { UserError::EmailTaken } else { UserError::Database(e) })?;
    let user = row_to_user(&row)?;

    if let Some(actor_id) = actor_id {
        activity::log_admin_activity(
            tx.as_mut(),
            actor_id,
            "user.create",
            "user",
            Some(user.id),
            serde_json::json!({ "email": user.email, "role": user.role.as_str() }),
        )
        .await?;
    }
    tx.commit().await?;

    info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok(user)
}

/// List users, optionally filtered by role.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_users(pool: &PgPool, role: Option<Role>) -> Result<Vec<UserRow>, UserError> {
    let rows = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY created_at DESC"
    ))
    .bind(role.map(Role::as_str))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()?)
}

/// Fetch one user.
///
/// # Errors
///
/// Returns `NotFound` if the user does not exist.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<UserRow, UserError> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound(user_id))?;
    Ok(row_to_user(&row)?)
}

/// Apply a partial update. Deactivation and password resets end the user's sessions.
///
/// # Errors
///
/// Returns `SelfModification` when an actor would demote or deactivate
/// themselves, `NotFound`, or a database error.
pub async fn update_user(pool: &PgPool, actor_id: Uuid, user_id: Uuid, update: &UserUpdate) -> Result<UserRow, UserError> {
    let demotes_self = update.role.is_some_and(|role| role != Role::SuperAdmin);
    let deactivates = update.is_active == Some(false);
    if actor_id == user_id && (demotes_self || deactivates) {
        return Err(UserError::SelfModification);
    }

    let password_hash = update.password.as_deref().map(hash_password).transpose()?;

    let mut tx = pool.begin().await?;
    let row = sqlx::query(&format!(
        "UPDATE users
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                password_hash = COALESCE($5, password_hash)
          WHERE id = $1
          RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(update.name.as_deref().map(str::trim).filter(|n| !n.is_empty()))
    .bind(update.role.map(Role::as_str))
    .bind(update.is_active)
    .bind(password_hash)
    .fetch_optional(tx.as_mut())
    .await?
    .ok_or(UserError::NotFound(user_id))?;
    let user = row_to_user(&row)?;

    if deactivates || update.password.is_some() {
        session::delete_user_sessions(tx.as_mut(), user_id).await?;
    }

    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "user.update",
        "user",
        Some(user_id),
        serde_json::json!({
            "name": update.name.is_some(),
            "role": update.role.map(Role::as_str),
            "is_active": update.is_active,
            "password_reset": update.password.is_some(),
        }),
    )
    .await?;
    tx.commit().await?;
    Ok(user)
}

/// Delete a user account.
///
/// # Errors
///
/// Returns `SelfModification`, `NotFound`, or a database error.
pub async fn delete_user(pool: &PgPool, actor_id: Uuid, user_id: Uuid) -> Result<(), UserError> {
    if actor_id == user_id {
        return Err(UserError::SelfModification);
    }
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(UserError::NotFound(user_id));
    }
    activity::log_admin_activity(tx.as_mut(), actor_id, "user.delete", "user", Some(user_id), serde_json::json!({}))
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Ensure the configured super-admin account exists and is active.
///
/// An existing account keeps its password; only missing accounts are created.
///
/// # Errors
///
/// Returns a validation, hashing, or database error.
pub async fn ensure_super_admin(pool: &PgPool, admin: &BootstrapAdmin) -> Result<Uuid, UserError> {
    let email = normalize_email(&admin.email).ok_or(UserError::InvalidEmail)?;
    let password_hash = hash_password(&admin.password)?;

    let row = sqlx::query(
        r"INSERT INTO users (email, name, password_hash, role)
          VALUES ($1, $2, $3, 'super_admin')
          ON CONFLICT (email) DO UPDATE SET role = 'super_admin', is_active = TRUE
          RETURNING id",
    )
    .bind(&email)
    .bind(&admin.name)
    .bind(&password_hash)
    .fetch_one(pool)
    .await?;

    let id: Uuid = row.try_get("id")?;
    info!(user_id = %id, "super admin ensured");
    Ok(id)
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
