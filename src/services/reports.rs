//! Reports — exam analytics, student results, dashboard counters.
//!
//! DESIGN
//! ======
//! Loaders fetch plain score rows; the statistics are computed by pure
//! functions over those rows. Only finished submissions (`submitted` or
//! `graded`) are counted. An attempt still in progress has no meaningful
//! score yet.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::exam::{self, ExamError, QuestionKind};
use crate::services::scoring::{self, LetterGrade};
use crate::services::submission::SubmissionStatus;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeCount {
    pub grade: LetterGrade,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub submission_count: usize,
    pub average_percent: f64,
    pub highest_percent: f64,
    pub lowest_percent: f64,
    pub pass_count: usize,
    pub pass_rate: f64,
    pub grade_distribution: Vec<GradeCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamReport {
    pub exam_id: Uuid,
    pub title: String,
    pub max_score: i64,
    pub passing_score: i32,
    pub summary: ScoreSummary,
    pub questions: Vec<QuestionStats>,
}

/// One scored answer, as read for per-question statistics.
#[derive(Debug, Clone, Copy)]
pub struct AnswerScore {
    pub question_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionStats {
    pub question_id: Uuid,
    pub prompt: String,
    pub kind: QuestionKind,
    pub points: i32,
    pub answered: usize,
    pub correct: usize,
    pub average_points: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentResult {
    pub submission_id: Uuid,
    pub exam_id: Uuid,
    pub exam_title: String,
    pub status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    pub total_score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub grade: LetterGrade,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardCounts {
    pub users_by_role: HashMap<String, i64>,
    pub exams: i64,
    pub published_exams: i64,
    pub submissions_by_status: HashMap<String, i64>,
    pub open_inquiries: i64,
}

// =============================================================================
// PURE STATISTICS
// =============================================================================

/// Summarize finished totals against an exam's maximum and pass mark.
#[must_use]
pub fn summarize(totals: &[i32], max_score: i32, passing_score: i32) -> ScoreSummary {
    let percents: Vec<f64> = totals.iter().map(|&t| scoring::percentage(t, max_score)).collect();
    let mut distribution: Vec<GradeCount> =
        LetterGrade::ALL.iter().map(|&grade| GradeCount { grade, count: 0 }).collect();

    let mut pass_count = 0;
    for &p in &percents {
        if scoring::passed(p, passing_score) {
            pass_count += 1;
        }
        let grade = LetterGrade::from_percentage(p);
        if let Some(slot) = distribution.iter_mut().find(|g| g.grade == grade) {
            slot.count += 1;
        }
    }

    let count = percents.len();
    if count == 0 {
        return ScoreSummary {
            submission_count: 0,
            average_percent: 0.0,
            highest_percent: 0.0,
            lowest_percent: 0.0,
            pass_count: 0,
            pass_rate: 0.0,
            grade_distribution: distribution,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    #[allow(clippy::cast_precision_loss)]
    let pass_rate = pass_count as f64 * 100.0 / n;
    ScoreSummary {
        submission_count: count,
        average_percent: percents.iter().sum::<f64>() / n,
        highest_percent: percents.iter().copied().fold(f64::MIN, f64::max),
        lowest_percent: percents.iter().copied().fold(f64::MAX, f64::min),
        pass_count,
        pass_rate,
        grade_distribution: distribution,
    }
}

/// Per-question answered / full-marks counts and average points.
#[must_use]
pub fn question_stats(questions: &[exam::QuestionRow], answers: &[AnswerScore]) -> Vec<QuestionStats> {
    questions
        .iter()
        .map(|q| {
            let scores: Vec<i32> = answers.iter().filter(|a| a.question_id == q.id).map(|a| a.score).collect();
            let answered = scores.len();
            let correct = scores.iter().filter(|&&s| s >= q.points).count();
            #[allow(clippy::cast_precision_loss)]
            let average_points = if answered == 0 {
                0.0
            } else {
                f64::from(scoring::aggregate(scores.iter().copied())) / answered as f64
            };
            QuestionStats {
                question_id: q.id,
                prompt: q.prompt.clone(),
                kind: q.kind,
                points: q.points,
                answered,
                correct,
                average_points,
            }
        })
        .collect()
}

// =============================================================================
// LOADERS
// =============================================================================

/// Build the analytics report for one exam.
///
/// # Errors
///
/// Returns `NotFound` for an unknown exam, or a database error.
pub async fn exam_report(pool: &PgPool, exam_id: Uuid) -> Result<ExamReport, ExamError> {
    let exam_row = exam::get_exam(pool, exam_id).await?;
    let questions = exam::list_questions(pool, exam_id).await?;

    let totals: Vec<i32> = sqlx::query_scalar(
        "SELECT total_score FROM exam_submissions WHERE exam_id = $1 AND status IN ('submitted', 'graded')",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query(
        r"SELECT a.question_id, a.score
            FROM exam_answers a
            JOIN exam_submissions s ON s.id = a.submission_id
           WHERE s.exam_id = $1 AND s.status IN ('submitted', 'graded') AND a.answer <> ''",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;
    let mut answers = Vec::with_capacity(answer_rows.len());
    for r in &answer_rows {
        answers.push(AnswerScore { question_id: r.try_get("question_id")?, score: r.try_get("score")? });
    }

    let max_score = i32::try_from(exam_row.total_points).unwrap_or(i32::MAX);
    Ok(ExamReport {
        exam_id,
        title: exam_row.title,
        max_score: exam_row.total_points,
        passing_score: exam_row.passing_score,
        summary: summarize(&totals, max_score, exam_row.passing_score),
        questions: question_stats(&questions, &answers),
    })
}

/// Every finished submission of one student, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn student_results(pool: &PgPool, student_id: Uuid) -> Result<Vec<StudentResult>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT s.id, s.exam_id, e.title, e.passing_score, s.status, s.submitted_at, s.total_score,
                 (SELECT COALESCE(SUM(q.points), 0)::int FROM exam_questions q WHERE q.exam_id = s.exam_id) AS max_score
            FROM exam_submissions s
            JOIN examinations e ON e.id = s.exam_id
           WHERE s.student_id = $1 AND s.status IN ('submitted', 'graded')
           ORDER BY s.submitted_at DESC NULLS LAST",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in &rows {
        let status: String = r.try_get("status")?;
        let total_score: i32 = r.try_get("total_score")?;
        let max_score: i32 = r.try_get("max_score")?;
        let passing_score: i32 = r.try_get("passing_score")?;
        let percentage = scoring::percentage(total_score, max_score);
        out.push(StudentResult {
            submission_id: r.try_get("id")?,
            exam_id: r.try_get("exam_id")?,
            exam_title: r.try_get("title")?,
            status: SubmissionStatus::decode(&status)?,
            submitted_at: r.try_get("submitted_at")?,
            total_score,
            max_score,
            percentage,
            grade: LetterGrade::from_percentage(percentage),
            passed: scoring::passed(percentage, passing_score),
        });
    }
    Ok(out)
}

async fn grouped_counts(pool: &PgPool, sql: &str) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    let mut out = HashMap::with_capacity(rows.len());
    for r in &rows {
        out.insert(r.try_get("key")?, r.try_get("n")?);
    }
    Ok(out)
}

/// Counters for the super-admin dashboard.
///
/// # Errors
///
/// Returns a database error if any count query fails.
pub async fn dashboard_counts(pool: &PgPool) -> Result<DashboardCounts, sqlx::Error> {
    let users_by_role = grouped_counts(pool, "SELECT role AS key, COUNT(*) AS n FROM users GROUP BY role").await?;
    let submissions_by_status =
        grouped_counts(pool, "SELECT status AS key, COUNT(*) AS n FROM exam_submissions GROUP BY status").await?;

    let exams = sqlx::query(
        "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_published) AS published FROM examinations",
    )
    .fetch_one(pool)
    .await?;
    let open_inquiries: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inquiries WHERE status IN ('open', 'in_progress')")
            .fetch_one(pool)
            .await?;

    Ok(DashboardCounts {
        users_by_role,
        exams: exams.try_get("total")?,
        published_exams: exams.try_get("published")?,
        submissions_by_status,
        open_inquiries,
    })
}

#[cfg(test)]
#[path = "reports_test.rs"]
mod tests;
