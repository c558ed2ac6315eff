//! Exam sessions — claim, answer, submit, and expire.
//!
//! DESIGN
//! ======
//! A student has at most one submission per exam, enforced by the
//! `UNIQUE (exam_id, student_id)` constraint. Starting an exam is a
//! conditional insert that hands back the existing row on conflict, so two
//! tabs racing to start the same exam both end up on the same attempt.
//!
//! The clock is the row's `started_at`: remaining time is the configured
//! duration minus the wall-clock time elapsed since then. When it reaches
//! zero the submission is auto-submitted, either lazily by the next request
//! that touches it or by the expiry sweeper.
//!
//! LIFECYCLE
//! =========
//! `in_progress` → `submitted` (essays await grading) → `graded`.
//! Exams without essay answers go straight to `graded` on submit.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::exam::{self, ExamError, PublicQuestion, QuestionKind};
use crate::services::{autosave, scoring};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Graded => "graded",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "submitted" => Some(Self::Submitted),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }

    /// Parse a status read from the database.
    ///
    /// # Errors
    ///
    /// Returns a decode error for values outside the schema's check constraint.
    pub fn decode(value: &str) -> Result<Self, sqlx::Error> {
        Self::parse(value).ok_or_else(|| sqlx::Error::Decode(format!("unknown submission status: {value}").into()))
    }

    /// Status after scoring: essays still awaiting a grader keep it `submitted`.
    #[must_use]
    pub fn after_scoring(ungraded_essays: usize) -> Self {
        if ungraded_essays == 0 { Self::Graded } else { Self::Submitted }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("exam not found: {0}")]
    ExamNotFound(Uuid),
    #[error("exam {0} is not open for new attempts")]
    NotAvailable(Uuid),
    #[error("submission not found: {0}")]
    NotFound(Uuid),
    #[error("submission {0} is no longer in progress")]
    NotInProgress(Uuid),
    #[error("time is up for submission {0}")]
    TimeExpired(Uuid),
    #[error("question {0} does not belong to this exam")]
    UnknownQuestion(Uuid),
    #[error(transparent)]
    Exam(ExamError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ExamError> for SubmissionError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::NotFound(id) => Self::ExamNotFound(id),
            ExamError::Database(e) => Self::Database(e),
            other => Self::Exam(other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    pub total_score: i32,
}

/// Everything a student needs to render (or resume) an attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExamSession {
    pub submission: SubmissionRow,
    pub exam_title: String,
    pub duration_minutes: i32,
    pub remaining_seconds: i64,
    pub questions: Vec<PublicQuestion>,
    /// Saved answers with unflushed edits overlaid, keyed by question.
    pub answers: HashMap<Uuid, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveAck {
    pub remaining_seconds: i64,
}

/// An exam as listed on the student dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StudentExamEntry {
    pub exam_id: Uuid,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub total_points: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub available_from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub available_until: Option<OffsetDateTime>,
    pub submission_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
    pub total_score: Option<i32>,
}

const SUBMISSION_COLUMNS: &str = "id, exam_id, student_id, status, started_at, submitted_at, total_score";

fn row_to_submission(r: &PgRow) -> Result<SubmissionRow, sqlx::Error> {
    let status: String = r.try_get("status")?;
    Ok(SubmissionRow {
        id: r.try_get("id")?,
        exam_id: r.try_get("exam_id")?,
        student_id: r.try_get("student_id")?,
        status: SubmissionStatus::decode(&status)?,
        started_at: r.try_get("started_at")?,
        submitted_at: r.try_get("submitted_at")?,
        total_score: r.try_get("total_score")?,
    })
}

// =============================================================================
// CLOCK
// =============================================================================

/// Seconds left in an attempt, clamped to `0..=duration`.
#[must_use]
pub fn remaining_seconds(duration_minutes: i32, started_at: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let total = i64::from(duration_minutes.max(0)) * 60;
    let elapsed = (now - started_at).whole_seconds().max(0);
    (total - elapsed).clamp(0, total)
}

// =============================================================================
// CLAIM
// =============================================================================

async fn find_submission(pool: &PgPool, exam_id: Uuid, student_id: Uuid) -> Result<Option<SubmissionRow>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM exam_submissions WHERE exam_id = $1 AND student_id = $2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_submission).transpose()
}

/// Claim the student's submission row for an exam, creating it if needed.
///
/// Returns the row and whether this call created it. Availability is only
/// enforced when a new attempt would be created; an existing attempt can
/// always be resumed or reviewed.
///
/// # Errors
///
/// Returns `ExamNotFound`, `NotAvailable`, or a database error.
pub async fn claim_submission(
    pool: &PgPool,
    exam_id: Uuid,
    student_id: Uuid,
) -> Result<(SubmissionRow, bool), SubmissionError> {
    if let Some(existing) = find_submission(pool, exam_id, student_id).await? {
        return Ok((existing, false));
    }

    let mut tx = pool.begin().await?;
    // Question edits hold FOR UPDATE on the exam row while they check for
    // attempts, so an attempt never starts against a half-edited key.
    sqlx::query("SELECT id FROM examinations WHERE id = $1 FOR SHARE")
        .bind(exam_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(SubmissionError::ExamNotFound(exam_id))?;

    let exam = exam::get_exam(tx.as_mut(), exam_id).await?;
    if !exam.is_open_at(OffsetDateTime::now_utc()) {
        return Err(SubmissionError::NotAvailable(exam_id));
    }

    // EDGE: a concurrent claim may have inserted between the lookup and here;
    // the no-op update makes RETURNING yield that row instead of nothing.
    let row = sqlx::query(&format!(
        r"INSERT INTO exam_submissions (exam_id, student_id)
          VALUES ($1, $2)
          ON CONFLICT (exam_id, student_id) DO UPDATE SET exam_id = EXCLUDED.exam_id
          RETURNING {SUBMISSION_COLUMNS}, (xmax = 0) AS created"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_one(tx.as_mut())
    .await?;
    tx.commit().await?;

    let created: bool = row.try_get("created")?;
    let submission = row_to_submission(&row)?;
    if created {
        info!(submission_id = %submission.id, %exam_id, %student_id, "exam attempt started");
    }
    Ok((submission, created))
}

/// Start or resume an exam.
///
/// # Errors
///
/// Returns `ExamNotFound`, `NotAvailable`, or a database error.
pub async fn start_exam(state: &AppState, exam_id: Uuid, student_id: Uuid) -> Result<ExamSession, SubmissionError> {
    let (mut submission, _created) = claim_submission(&state.pool, exam_id, student_id).await?;
    let exam = exam::get_exam(&state.pool, exam_id).await?;

    let mut remaining = remaining_seconds(exam.duration_minutes, submission.started_at, OffsetDateTime::now_utc());
    if submission.status == SubmissionStatus::InProgress && remaining == 0 {
        submission = finalize_submission(state, submission.id).await?;
    }
    if submission.status != SubmissionStatus::InProgress {
        remaining = 0;
    }

    let questions = exam::list_questions(&state.pool, exam_id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    let mut answers = saved_answers(&state.pool, submission.id).await?;
    if submission.status == SubmissionStatus::InProgress {
        answers.extend(autosave::pending_for(state, submission.id).await);
    }

    Ok(ExamSession {
        submission,
        exam_title: exam.title,
        duration_minutes: exam.duration_minutes,
        remaining_seconds: remaining,
        questions,
        answers,
    })
}

async fn saved_answers(pool: &PgPool, submission_id: Uuid) -> Result<HashMap<Uuid, String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT question_id, answer FROM exam_answers WHERE submission_id = $1")
        .bind(submission_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Load a submission owned by `student_id` together with its exam duration.
async fn owned_submission(
    pool: &PgPool,
    submission_id: Uuid,
    student_id: Uuid,
) -> Result<(SubmissionRow, i32), SubmissionError> {
    let row = sqlx::query(
        r"SELECT s.id, s.exam_id, s.student_id, s.status, s.started_at, s.submitted_at, s.total_score,
                 e.duration_minutes
            FROM exam_submissions s
            JOIN examinations e ON e.id = s.exam_id
           WHERE s.id = $1 AND s.student_id = $2",
    )
    .bind(submission_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?
    .ok_or(SubmissionError::NotFound(submission_id))?;

    let duration: i32 = row.try_get("duration_minutes")?;
    Ok((row_to_submission(&row)?, duration))
}

// =============================================================================
// ANSWERS
// =============================================================================

/// Record an answer edit for the debounced autosave.
///
/// # Errors
///
/// Returns `NotFound` for someone else's submission, `NotInProgress` after
/// submission, `TimeExpired` once the clock ran out (the attempt is
/// auto-submitted), `UnknownQuestion`, or a database error.
pub async fn save_answer(
    state: &AppState,
    submission_id: Uuid,
    student_id: Uuid,
    question_id: Uuid,
    answer: String,
) -> Result<SaveAck, SubmissionError> {
    let (submission, duration) = owned_submission(&state.pool, submission_id, student_id).await?;
    if submission.status != SubmissionStatus::InProgress {
        return Err(SubmissionError::NotInProgress(submission_id));
    }

    let remaining = remaining_seconds(duration, submission.started_at, OffsetDateTime::now_utc());
    if remaining == 0 {
        match finalize_submission(state, submission_id).await {
            Ok(_) | Err(SubmissionError::NotInProgress(_)) => {}
            Err(e) => return Err(e),
        }
        return Err(SubmissionError::TimeExpired(submission_id));
    }

    let belongs: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM exam_questions WHERE id = $1 AND exam_id = $2)")
        .bind(question_id)
        .bind(submission.exam_id)
        .fetch_one(&state.pool)
        .await?;
    if !belongs {
        return Err(SubmissionError::UnknownQuestion(question_id));
    }

    autosave::record(state, submission_id, question_id, answer).await;
    Ok(SaveAck { remaining_seconds: remaining })
}

// =============================================================================
// SUBMIT
// =============================================================================

/// Manually submit the student's own attempt.
///
/// # Errors
///
/// Returns `NotFound`, `NotInProgress`, or a database error.
pub async fn submit(state: &AppState, submission_id: Uuid, student_id: Uuid) -> Result<SubmissionRow, SubmissionError> {
    let (submission, _) = owned_submission(&state.pool, submission_id, student_id).await?;
    if submission.status != SubmissionStatus::InProgress {
        return Err(SubmissionError::NotInProgress(submission_id));
    }
    finalize_submission(state, submission_id).await
}

/// Flush pending answers, score them, and mark the submission terminal.
///
/// The flush runs under the submission's row lock, so no autosave write can
/// land between it and scoring.
///
/// # Errors
///
/// Returns `NotFound`, `NotInProgress` if another path finished it first, or
/// a database error. Pending answers stay buffered if anything fails.
pub async fn finalize_submission(state: &AppState, submission_id: Uuid) -> Result<SubmissionRow, SubmissionError> {
    let mut tx = state.pool.begin().await?;

    let row = sqlx::query(&format!("SELECT {SUBMISSION_COLUMNS} FROM exam_submissions WHERE id = $1 FOR UPDATE"))
        .bind(submission_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(SubmissionError::NotFound(submission_id))?;
    let locked = row_to_submission(&row)?;
    if locked.status != SubmissionStatus::InProgress {
        return Err(SubmissionError::NotInProgress(submission_id));
    }

    let flushed = autosave::flush_submission(state, tx.as_mut(), submission_id).await?;

    let answers = sqlx::query(
        r"SELECT a.id, a.answer, q.kind, q.correct_answer, q.points
            FROM exam_answers a
            JOIN exam_questions q ON q.id = a.question_id
           WHERE a.submission_id = $1",
    )
    .bind(submission_id)
    .fetch_all(tx.as_mut())
    .await?;

    let mut scores = Vec::with_capacity(answers.len());
    let mut ungraded_essays = 0usize;
    for answer in &answers {
        let kind = QuestionKind::decode(&answer.try_get::<String, _>("kind")?)?;
        let correct: Option<String> = answer.try_get("correct_answer")?;
        let text: String = answer.try_get("answer")?;
        let score = scoring::score_answer(kind, correct.as_deref(), answer.try_get("points")?, &text);
        if kind == QuestionKind::Essay {
            ungraded_essays += 1;
        }

        sqlx::query("UPDATE exam_answers SET score = $2, updated_at = now() WHERE id = $1")
            .bind(answer.try_get::<Uuid, _>("id")?)
            .bind(score)
            .execute(tx.as_mut())
            .await?;
        scores.push(score);
    }

    let status = SubmissionStatus::after_scoring(ungraded_essays);
    let total = scoring::aggregate(scores);
    let row = sqlx::query(&format!(
        r"UPDATE exam_submissions
             SET status = $2, submitted_at = now(), total_score = $3
           WHERE id = $1
          RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(submission_id)
    .bind(status.as_str())
    .bind(total)
    .fetch_one(tx.as_mut())
    .await?;
    tx.commit().await?;

    // Anything typed after the flush above can no longer be written.
    autosave::discard_submission(state, submission_id).await;

    info!(%submission_id, flushed, total, status = status.as_str(), "submission finalized");
    Ok(row_to_submission(&row)?)
}

// =============================================================================
// EXPIRY
// =============================================================================

/// Auto-submit every in-progress attempt whose time has run out.
///
/// # Errors
///
/// Returns a database error if the expired rows cannot be listed.
pub async fn auto_submit_expired(state: &AppState) -> Result<usize, sqlx::Error> {
    let expired: Vec<Uuid> = sqlx::query_scalar(
        r"SELECT s.id
            FROM exam_submissions s
            JOIN examinations e ON e.id = s.exam_id
           WHERE s.status = 'in_progress'
             AND s.started_at + make_interval(mins => e.duration_minutes) <= now()",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut finalized = 0;
    for submission_id in expired {
        match finalize_submission(state, submission_id).await {
            Ok(_) => finalized += 1,
            Err(SubmissionError::NotInProgress(_)) => {}
            Err(e) => warn!(error = %e, %submission_id, "auto-submit failed"),
        }
    }
    Ok(finalized)
}

/// Spawn the expiry sweeper. Returns a handle for shutdown.
pub fn spawn_expiry_sweeper(state: AppState) -> JoinHandle<()> {
    let every = state.config.expiry_sweep;
    info!(sweep_secs = every.as_secs(), "expiry sweeper configured");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match auto_submit_expired(&state).await {
                Ok(0) => {}
                Ok(count) => info!(count, "expired attempts auto-submitted"),
                Err(e) => error!(error = %e, "expiry sweep failed"),
            }
        }
    })
}

// =============================================================================
// STUDENT DASHBOARD
// =============================================================================

/// Published exams with the student's own attempt status, if any.
///
/// Exams the student already attempted are listed even after they close.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_student_exams(pool: &PgPool, student_id: Uuid) -> Result<Vec<StudentExamEntry>, SubmissionError> {
    let rows = sqlx::query(
        r"SELECT e.id AS exam_id, e.title, e.description, e.duration_minutes,
                 e.available_from, e.available_until,
                 (SELECT COALESCE(SUM(q.points), 0)::bigint FROM exam_questions q WHERE q.exam_id = e.id) AS total_points,
                 s.id AS submission_id, s.status, s.total_score
            FROM examinations e
            LEFT JOIN exam_submissions s ON s.exam_id = e.id AND s.student_id = $1
           WHERE e.is_published OR s.id IS NOT NULL
           ORDER BY e.created_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in &rows {
        let status: Option<String> = r.try_get("status")?;
        out.push(StudentExamEntry {
            exam_id: r.try_get("exam_id")?,
            title: r.try_get("title")?,
            description: r.try_get("description")?,
            duration_minutes: r.try_get("duration_minutes")?,
            total_points: r.try_get("total_points")?,
            available_from: r.try_get("available_from")?,
            available_until: r.try_get("available_until")?,
            submission_id: r.try_get("submission_id")?,
            status: status.as_deref().map(SubmissionStatus::decode).transpose()?,
            total_score: r.try_get("total_score")?,
        });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "submission_test.rs"]
mod tests;
