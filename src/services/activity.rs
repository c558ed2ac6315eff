//! Admin activity log.
//!
//! Writes go through the `log_admin_activity` database function so that
//! procedures such as `transition_inquiry_status` and the service share one
//! insert path.

use serde::Serialize;
use sqlx::{Executor, PgPool, Postgres, Row};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogRow {
    pub id: i64,
    pub admin_id: Option<Uuid>,
    pub admin_name: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Record one admin action. Accepts a pool or an open transaction.
///
/// # Errors
///
/// Returns a database error if the procedure call fails.
pub async fn log_admin_activity<'e, E>(
    executor: E,
    admin_id: Uuid,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: serde_json::Value,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT log_admin_activity($1, $2, $3, $4, $5) AS id")
        .bind(admin_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .fetch_one(executor)
        .await?;
    row.try_get("id")
}

#[must_use]
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Page through activity logs, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_activity(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ActivityLogRow>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT l.id, l.admin_id, u.name AS admin_name, l.action, l.entity_type, l.entity_id, l.details, l.created_at
            FROM admin_activity_logs l
            LEFT JOIN users u ON u.id = l.admin_id
           ORDER BY l.created_at DESC, l.id DESC
           LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(ActivityLogRow {
                id: r.try_get("id")?,
                admin_id: r.try_get("admin_id")?,
                admin_name: r.try_get("admin_name")?,
                action: r.try_get("action")?,
                entity_type: r.try_get("entity_type")?,
                entity_id: r.try_get("entity_id")?,
                details: r.try_get("details")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_page_defaults() {
        assert_eq!(clamp_page(None, None), (50, 0));
    }

    #[test]
    fn clamp_page_bounds_limit_and_offset() {
        assert_eq!(clamp_page(Some(0), Some(-5)), (1, 0));
        assert_eq!(clamp_page(Some(10_000), Some(20)), (MAX_PAGE_SIZE, 20));
    }
}
