//! Manual grading and aggregate recomputation.
//!
//! A grader may overwrite any per-answer score of a finished submission.
//! After each edit the submission's total is recomputed from scratch as the
//! sum of its answer scores, inside the same transaction, so the total can
//! never drift from the rows it summarizes.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::services::activity;
use crate::services::exam::QuestionKind;
use crate::services::submission::{SubmissionRow, SubmissionStatus};

#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("submission not found: {0}")]
    SubmissionNotFound(Uuid),
    #[error("question not found on this exam: {0}")]
    QuestionNotFound(Uuid),
    #[error("submission {0} has not been submitted yet")]
    NotSubmitted(Uuid),
    #[error("score {score} outside 0..={max}")]
    ScoreOutOfRange { score: i32, max: i32 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    pub total_score: i32,
    pub ungraded_essays: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerDetail {
    pub question_id: Uuid,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub points: i32,
    /// `None` when the student left the question blank.
    pub answer: Option<String>,
    pub score: i32,
    pub graded: bool,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    pub submission: SubmissionRow,
    pub student_name: String,
    pub exam_title: String,
    pub max_score: i64,
    pub answers: Vec<AnswerDetail>,
}

/// Check a manual score against the question's point value.
///
/// # Errors
///
/// Returns `ScoreOutOfRange` if `score` is negative or above `points`.
pub fn validate_score(score: i32, points: i32) -> Result<(), GradingError> {
    if (0..=points).contains(&score) {
        Ok(())
    } else {
        Err(GradingError::ScoreOutOfRange { score, max: points })
    }
}

/// List every submission of an exam for the grading table.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_submissions(pool: &PgPool, exam_id: Uuid) -> Result<Vec<SubmissionSummary>, GradingError> {
    let rows = sqlx::query(
        r"SELECT s.id, s.student_id, u.name AS student_name, u.email AS student_email,
                 s.status, s.started_at, s.submitted_at, s.total_score,
                 (SELECT COUNT(*)
                    FROM exam_answers a
                    JOIN exam_questions q ON q.id = a.question_id
                   WHERE a.submission_id = s.id AND q.kind = 'essay' AND a.graded_at IS NULL) AS ungraded_essays
            FROM exam_submissions s
            JOIN users u ON u.id = s.student_id
           WHERE s.exam_id = $1
           ORDER BY s.submitted_at DESC NULLS LAST, u.name ASC",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in &rows {
        let status: String = r.try_get("status")?;
        out.push(SubmissionSummary {
            id: r.try_get("id")?,
            student_id: r.try_get("student_id")?,
            student_name: r.try_get("student_name")?,
            student_email: r.try_get("student_email")?,
            status: SubmissionStatus::decode(&status)?,
            started_at: r.try_get("started_at")?,
            submitted_at: r.try_get("submitted_at")?,
            total_score: r.try_get("total_score")?,
            ungraded_essays: r.try_get("ungraded_essays")?,
        });
    }
    Ok(out)
}

/// Load a submission with every question of its exam and the matching answers.
///
/// # Errors
///
/// Returns `SubmissionNotFound` or a database error.
pub async fn submission_detail(pool: &PgPool, submission_id: Uuid) -> Result<SubmissionDetail, GradingError> {
    let head = sqlx::query(
        r"SELECT s.id, s.exam_id, s.student_id, s.status, s.started_at, s.submitted_at, s.total_score,
                 u.name AS student_name, e.title AS exam_title,
                 (SELECT COALESCE(SUM(q.points), 0)::bigint FROM exam_questions q WHERE q.exam_id = s.exam_id) AS max_score
            FROM exam_submissions s
            JOIN users u ON u.id = s.student_id
            JOIN examinations e ON e.id = s.exam_id
           WHERE s.id = $1",
    )
    .bind(submission_id)
    .fetch_optional(pool)
    .await?
    .ok_or(GradingError::SubmissionNotFound(submission_id))?;

    let status: String = head.try_get("status")?;
    let submission = SubmissionRow {
        id: head.try_get("id")?,
        exam_id: head.try_get("exam_id")?,
        student_id: head.try_get("student_id")?,
        status: SubmissionStatus::decode(&status)?,
        started_at: head.try_get("started_at")?,
        submitted_at: head.try_get("submitted_at")?,
        total_score: head.try_get("total_score")?,
    };

    let rows = sqlx::query(
        r"SELECT q.id AS question_id, q.kind, q.prompt, q.options, q.correct_answer, q.points,
                 a.answer, COALESCE(a.score, 0) AS score, a.graded_at IS NOT NULL AS graded, a.feedback
            FROM exam_questions q
            LEFT JOIN exam_answers a ON a.question_id = q.id AND a.submission_id = $1
           WHERE q.exam_id = $2
           ORDER BY q.position ASC, q.created_at ASC",
    )
    .bind(submission_id)
    .bind(submission.exam_id)
    .fetch_all(pool)
    .await?;

    let mut answers = Vec::with_capacity(rows.len());
    for r in &rows {
        let kind: String = r.try_get("kind")?;
        let options: Json<Vec<String>> = r.try_get("options")?;
        answers.push(AnswerDetail {
            question_id: r.try_get("question_id")?,
            kind: QuestionKind::decode(&kind)?,
            prompt: r.try_get("prompt")?,
            options: options.0,
            correct_answer: r.try_get("correct_answer")?,
            points: r.try_get("points")?,
            answer: r.try_get("answer")?,
            score: r.try_get("score")?,
            graded: r.try_get("graded")?,
            feedback: r.try_get("feedback")?,
        });
    }

    Ok(SubmissionDetail {
        submission,
        student_name: head.try_get("student_name")?,
        exam_title: head.try_get("exam_title")?,
        max_score: head.try_get("max_score")?,
        answers,
    })
}

/// Overwrite one answer's score and recompute the submission total.
///
/// Blank answers can be graded too; a row is created for them. The
/// submission becomes `graded` once no essay answer is left ungraded.
///
/// # Errors
///
/// Returns `SubmissionNotFound`, `NotSubmitted`, `QuestionNotFound`,
/// `ScoreOutOfRange`, or a database error.
pub async fn grade_answer(
    pool: &PgPool,
    grader_id: Uuid,
    submission_id: Uuid,
    question_id: Uuid,
    score: i32,
    feedback: Option<&str>,
) -> Result<SubmissionRow, GradingError> {
    let mut tx = pool.begin().await?;

    let head = sqlx::query("SELECT exam_id, status FROM exam_submissions WHERE id = $1 FOR UPDATE")
        .bind(submission_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(GradingError::SubmissionNotFound(submission_id))?;
    let exam_id: Uuid = head.try_get("exam_id")?;
    let status: String = head.try_get("status")?;
    if SubmissionStatus::decode(&status)? == SubmissionStatus::InProgress {
        return Err(GradingError::NotSubmitted(submission_id));
    }

    let points: i32 = sqlx::query_scalar("SELECT points FROM exam_questions WHERE id = $1 AND exam_id = $2")
        .bind(question_id)
        .bind(exam_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(GradingError::QuestionNotFound(question_id))?;
    validate_score(score, points)?;

    sqlx::query(
        r"INSERT INTO exam_answers (submission_id, question_id, answer, score, graded_at, graded_by, feedback)
          VALUES ($1, $2, '', $3, now(), $4, $5)
          ON CONFLICT (submission_id, question_id)
          DO UPDATE SET score = EXCLUDED.score, graded_at = now(), graded_by = EXCLUDED.graded_by,
                        feedback = COALESCE(EXCLUDED.feedback, exam_answers.feedback), updated_at = now()",
    )
    .bind(submission_id)
    .bind(question_id)
    .bind(score)
    .bind(grader_id)
    .bind(feedback)
    .execute(tx.as_mut())
    .await?;

    let totals = sqlx::query(
        r"SELECT COALESCE(SUM(a.score), 0)::int AS total,
                 COUNT(*) FILTER (WHERE q.kind = 'essay' AND a.graded_at IS NULL) AS ungraded
            FROM exam_answers a
            JOIN exam_questions q ON q.id = a.question_id
           WHERE a.submission_id = $1",
    )
    .bind(submission_id)
    .fetch_one(tx.as_mut())
    .await?;
    let total: i32 = totals.try_get("total")?;
    let ungraded: i64 = totals.try_get("ungraded")?;
    let new_status = SubmissionStatus::after_scoring(usize::try_from(ungraded).unwrap_or(usize::MAX));

    let row = sqlx::query(
        r"UPDATE exam_submissions SET total_score = $2, status = $3 WHERE id = $1
          RETURNING id, exam_id, student_id, status, started_at, submitted_at, total_score",
    )
    .bind(submission_id)
    .bind(total)
    .bind(new_status.as_str())
    .fetch_one(tx.as_mut())
    .await?;

    activity::log_admin_activity(
        tx.as_mut(),
        grader_id,
        "answer.grade",
        "exam_submission",
        Some(submission_id),
        serde_json::json!({ "question_id": question_id, "score": score, "total": total }),
    )
    .await?;
    tx.commit().await?;

    info!(%submission_id, %question_id, score, total, "answer graded");
    let status: String = row.try_get("status")?;
    Ok(SubmissionRow {
        id: row.try_get("id")?,
        exam_id: row.try_get("exam_id")?,
        student_id: row.try_get("student_id")?,
        status: SubmissionStatus::decode(&status)?,
        started_at: row.try_get("started_at")?,
        submitted_at: row.try_get("submitted_at")?,
        total_score: row.try_get("total_score")?,
    })
}
