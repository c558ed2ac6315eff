//! System settings — a key/JSON-value table edited by the super admin.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::activity;

const MAX_KEY_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("setting not found: {0}")]
    NotFound(String),
    #[error("invalid setting key: {0}")]
    InvalidKey(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingRow {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn row_to_setting(r: &PgRow) -> Result<SettingRow, sqlx::Error> {
    Ok(SettingRow {
        key: r.try_get("key")?,
        value: r.try_get("value")?,
        updated_by: r.try_get("updated_by")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Keys are lowercase dotted identifiers such as `exam.default_duration`.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        && !key.starts_with('.')
        && !key.ends_with('.')
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_settings(pool: &PgPool) -> Result<Vec<SettingRow>, SettingsError> {
    let rows = sqlx::query("SELECT key, value, updated_by, updated_at FROM system_settings ORDER BY key")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_setting).collect::<Result<_, _>>()?)
}

/// # Errors
///
/// Returns `NotFound` or a database error.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<SettingRow, SettingsError> {
    let row = sqlx::query("SELECT key, value, updated_by, updated_at FROM system_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SettingsError::NotFound(key.to_owned()))?;
    Ok(row_to_setting(&row)?)
}

/// Insert or replace one setting, logging the change.
///
/// # Errors
///
/// Returns `InvalidKey` or a database error.
pub async fn upsert_setting(
    pool: &PgPool,
    admin_id: Uuid,
    key: &str,
    value: serde_json::Value,
) -> Result<SettingRow, SettingsError> {
    if !is_valid_key(key) {
        return Err(SettingsError::InvalidKey(key.to_owned()));
    }

    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        r"INSERT INTO system_settings (key, value, updated_by, updated_at)
          VALUES ($1, $2, $3, now())
          ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_by = EXCLUDED.updated_by, updated_at = now()
          RETURNING key, value, updated_by, updated_at",
    )
    .bind(key)
    .bind(&value)
    .bind(admin_id)
    .fetch_one(tx.as_mut())
    .await?;
    activity::log_admin_activity(
        tx.as_mut(),
        admin_id,
        "setting.update",
        "system_setting",
        None,
        serde_json::json!({ "key": key, "value": value }),
    )
    .await?;
    tx.commit().await?;

    Ok(row_to_setting(&row)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_lowercase_keys() {
        assert!(is_valid_key("exam.default_duration"));
        assert!(is_valid_key("site-name"));
        assert!(is_valid_key("max_attempts2"));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("Site.Name"));
        assert!(!is_valid_key("has space"));
        assert!(!is_valid_key(".leading"));
        assert!(!is_valid_key("trailing."));
        assert!(!is_valid_key(&"k".repeat(101)));
    }
}
