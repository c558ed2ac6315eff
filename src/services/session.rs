//! Session token management with an inactivity timeout.
//!
//! ARCHITECTURE
//! ============
//! Login issues a random token stored in an HttpOnly cookie. Each validated
//! request slides `last_seen_at` forward, so a session only dies after a
//! full idle window passes without traffic.
//!
//! TRADE-OFFS
//! ==========
//! Validation and the touch happen in a single `UPDATE ... RETURNING`, which
//! costs a write per authenticated request but keeps expiry exact without a
//! separate refresh call.

use std::fmt::Write;
use std::time::Duration;

use rand::Rng;
use sqlx::{Executor, PgPool, Postgres, Row};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::user::Role;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// User row returned from session validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Create a session for the given user, returning the token.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
        .bind(&token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token, sliding its idle deadline forward on success.
///
/// Returns `None` for unknown tokens, idle sessions, and deactivated users.
pub async fn validate_session(
    pool: &PgPool,
    token: &str,
    idle_timeout: Duration,
) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        r"WITH touched AS (
              UPDATE sessions
                 SET last_seen_at = now()
               WHERE token = $1
                 AND last_seen_at > now() - make_interval(secs => $2)
              RETURNING user_id
          )
          SELECT u.id, u.email, u.name, u.role
            FROM touched t
            JOIN users u ON u.id = t.user_id
           WHERE u.is_active",
    )
    .bind(token)
    .bind(idle_timeout.as_secs_f64())
    .fetch_optional(pool)
    .await?;

    let Some(r) = row else {
        return Ok(None);
    };
    let role: String = r.try_get("role")?;
    Ok(Some(SessionUser {
        id: r.try_get("id")?,
        email: r.try_get("email")?,
        name: r.try_get("name")?,
        role: Role::decode(&role)?,
    }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every session belonging to a user (deactivation, password reset).
pub async fn delete_user_sessions<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Remove sessions idle longer than the timeout.
pub async fn sweep_idle_sessions(pool: &PgPool, idle_timeout: Duration) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE last_seen_at <= now() - make_interval(secs => $1)")
        .bind(idle_timeout.as_secs_f64())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Spawn the idle-session sweeper. Runs once per idle window.
pub fn spawn_session_sweeper(pool: PgPool, idle_timeout: Duration) -> JoinHandle<()> {
    info!(idle_timeout_secs = idle_timeout.as_secs(), "session sweeper configured");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(idle_timeout.max(Duration::from_secs(60)));
        loop {
            interval.tick().await;
            match sweep_idle_sessions(&pool, idle_timeout).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "idle sessions swept"),
                Err(e) => error!(error = %e, "idle session sweep failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
