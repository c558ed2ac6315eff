//! Inquiries — support requests from users, handled by admins.
//!
//! Status changes are applied by the `transition_inquiry_status` database
//! function, which only updates a row still in the expected `from` state and
//! writes the activity log entry in the same statement.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

const MAX_SUBJECT_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl InquiryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Parse a status read from the database.
    ///
    /// # Errors
    ///
    /// Returns a decode error for values outside the schema's check constraint.
    pub fn decode(value: &str) -> Result<Self, sqlx::Error> {
        Self::parse(value).ok_or_else(|| sqlx::Error::Decode(format!("unknown inquiry status: {value}").into()))
    }

    /// Allowed lifecycle edges. `resolved -> in_progress` reopens.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::InProgress | Self::Closed)
                | (Self::InProgress, Self::Resolved | Self::Closed)
                | (Self::Resolved, Self::Closed | Self::InProgress)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InquiryError {
    #[error("inquiry not found: {0}")]
    NotFound(Uuid),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("cannot move inquiry from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("inquiry {0} changed concurrently")]
    Conflict(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct InquiryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub subject: String,
    pub message: String,
    pub status: InquiryStatus,
    pub response: Option<String>,
    pub handled_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const INQUIRY_SELECT: &str = r"SELECT i.id, i.user_id, u.name AS user_name, i.subject, i.message, i.status,
                                      i.response, i.handled_by, i.created_at, i.updated_at
                                 FROM inquiries i
                                 JOIN users u ON u.id = i.user_id";

fn row_to_inquiry(r: &PgRow) -> Result<InquiryRow, sqlx::Error> {
    let status: String = r.try_get("status")?;
    Ok(InquiryRow {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        user_name: r.try_get("user_name")?,
        subject: r.try_get("subject")?,
        message: r.try_get("message")?,
        status: InquiryStatus::decode(&status)?,
        response: r.try_get("response")?,
        handled_by: r.try_get("handled_by")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Validate and trim a new inquiry's subject and message.
///
/// # Errors
///
/// Returns `Invalid` for an empty or overlong subject, or an empty message.
pub fn validate_inquiry<'a>(subject: &'a str, message: &'a str) -> Result<(&'a str, &'a str), InquiryError> {
    let subject = subject.trim();
    let message = message.trim();
    if subject.is_empty() {
        return Err(InquiryError::Invalid("subject is required".into()));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(InquiryError::Invalid("subject is too long".into()));
    }
    if message.is_empty() {
        return Err(InquiryError::Invalid("message is required".into()));
    }
    Ok((subject, message))
}

/// Open a new inquiry.
///
/// # Errors
///
/// Returns `Invalid` or a database error.
pub async fn create_inquiry(pool: &PgPool, user_id: Uuid, subject: &str, message: &str) -> Result<InquiryRow, InquiryError> {
    let (subject, message) = validate_inquiry(subject, message)?;
    let id: Uuid = sqlx::query_scalar("INSERT INTO inquiries (user_id, subject, message) VALUES ($1, $2, $3) RETURNING id")
        .bind(user_id)
        .bind(subject)
        .bind(message)
        .fetch_one(pool)
        .await?;
    info!(inquiry_id = %id, %user_id, "inquiry opened");
    get_inquiry(pool, id).await
}

/// List inquiries newest first. `owner` limits the list to one user's own.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_inquiries(
    pool: &PgPool,
    owner: Option<Uuid>,
    status: Option<InquiryStatus>,
) -> Result<Vec<InquiryRow>, InquiryError> {
    let rows = sqlx::query(&format!(
        "{INQUIRY_SELECT}
          WHERE ($1::uuid IS NULL OR i.user_id = $1)
            AND ($2::text IS NULL OR i.status = $2)
          ORDER BY i.created_at DESC"
    ))
    .bind(owner)
    .bind(status.map(InquiryStatus::as_str))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_inquiry).collect::<Result<_, _>>()?)
}

/// Load one inquiry.
///
/// # Errors
///
/// Returns `NotFound` or a database error.
pub async fn get_inquiry(pool: &PgPool, inquiry_id: Uuid) -> Result<InquiryRow, InquiryError> {
    let row = sqlx::query(&format!("{INQUIRY_SELECT} WHERE i.id = $1"))
        .bind(inquiry_id)
        .fetch_optional(pool)
        .await?
        .ok_or(InquiryError::NotFound(inquiry_id))?;
    Ok(row_to_inquiry(&row)?)
}

/// Move an inquiry to a new status, optionally attaching a response.
///
/// # Errors
///
/// Returns `NotFound`, `InvalidTransition`, `Conflict` when the row changed
/// between read and update, or a database error.
pub async fn transition(
    pool: &PgPool,
    admin_id: Uuid,
    inquiry_id: Uuid,
    to: InquiryStatus,
    response: Option<&str>,
) -> Result<InquiryRow, InquiryError> {
    let current = get_inquiry(pool, inquiry_id).await?;
    if !current.status.can_transition_to(to) {
        return Err(InquiryError::InvalidTransition { from: current.status.as_str(), to: to.as_str() });
    }

    let applied: bool = sqlx::query_scalar("SELECT transition_inquiry_status($1, $2, $3, $4, $5)")
        .bind(inquiry_id)
        .bind(current.status.as_str())
        .bind(to.as_str())
        .bind(admin_id)
        .bind(response.map(str::trim).filter(|r| !r.is_empty()))
        .fetch_one(pool)
        .await?;
    if !applied {
        return Err(InquiryError::Conflict(inquiry_id));
    }

    info!(%inquiry_id, from = current.status.as_str(), to = to.as_str(), "inquiry transitioned");
    get_inquiry(pool, inquiry_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InquiryStatus; 4] =
        [InquiryStatus::Open, InquiryStatus::InProgress, InquiryStatus::Resolved, InquiryStatus::Closed];

    #[test]
    fn status_round_trips() {
        for status in ALL {
            assert_eq!(InquiryStatus::parse(status.as_str()), Some(status));
        }
        assert!(InquiryStatus::decode("pending").is_err());
    }

    #[test]
    fn lifecycle_edges_are_allowed() {
        use InquiryStatus::*;
        for (from, to) in [
            (Open, InProgress),
            (InProgress, Resolved),
            (Resolved, Closed),
            (Open, Closed),
            (InProgress, Closed),
            (Resolved, InProgress),
        ] {
            assert!(from.can_transition_to(to), "{from:?} -> {to:?} should be allowed");
        }
    }

    #[test]
    fn other_edges_are_rejected() {
        use InquiryStatus::*;
        for (from, to) in [(Open, Resolved), (Closed, Open), (Closed, InProgress), (Resolved, Open), (InProgress, Open)] {
            assert!(!from.can_transition_to(to), "{from:?} -> {to:?} should be rejected");
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn validate_inquiry_trims_and_rejects_blank() {
        assert_eq!(validate_inquiry("  Help ", " body ").unwrap(), ("Help", "body"));
        assert!(matches!(validate_inquiry("   ", "body"), Err(InquiryError::Invalid(_))));
        assert!(matches!(validate_inquiry("Help", ""), Err(InquiryError::Invalid(_))));
        assert!(matches!(validate_inquiry(&"x".repeat(201), "body"), Err(InquiryError::Invalid(_))));
    }
}
