//! Exam authoring — folders, examinations, and questions.
//!
//! DESIGN
//! ======
//! Instructors build exams as a draft, add questions, then publish. Students
//! only ever see published exams inside their availability window, and never
//! see `correct_answer` (see [`PublicQuestion`]).
//!
//! Once any student has claimed a submission, the question set and duration
//! are frozen so existing answers keep scoring against the key they were
//! written for and running timers keep their deadline. Every edit and its
//! activity log row commit in one transaction.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Executor, PgConnection, PgPool, Postgres, Row};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::services::activity;
use crate::services::scoring::parse_selection;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    MultipleCheckboxes,
    Essay,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::MultipleCheckboxes => "multiple_checkboxes",
            Self::Essay => "essay",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "multiple_choice" => Some(Self::MultipleChoice),
            "multiple_checkboxes" => Some(Self::MultipleCheckboxes),
            "essay" => Some(Self::Essay),
            _ => None,
        }
    }

    /// Parse a kind read from the database.
    ///
    /// # Errors
    ///
    /// Returns a decode error for values outside the schema's check constraint.
    pub fn decode(value: &str) -> Result<Self, sqlx::Error> {
        Self::parse(value).ok_or_else(|| sqlx::Error::Decode(format!("unknown question kind: {value}").into()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error("exam not found: {0}")]
    NotFound(Uuid),
    #[error("question not found: {0}")]
    QuestionNotFound(Uuid),
    #[error("folder not found: {0}")]
    FolderNotFound(Uuid),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("exam {0} already has submissions; questions and duration are frozen")]
    Locked(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderRow {
    pub id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
    pub exam_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamRow {
    pub id: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub passing_score: i32,
    pub is_published: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub available_from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub available_until: Option<OffsetDateTime>,
    pub created_by: Option<Uuid>,
    pub question_count: i64,
    pub total_points: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ExamRow {
    /// Whether a student may open a new attempt at `now`.
    #[must_use]
    pub fn is_open_at(&self, now: OffsetDateTime) -> bool {
        self.is_published
            && self.available_from.is_none_or(|from| now >= from)
            && self.available_until.is_none_or(|until| now < until)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExamInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: i32,
    #[serde(default = "default_passing_score")]
    pub passing_score: i32,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub available_from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub available_until: Option<OffsetDateTime>,
}

fn default_passing_score() -> i32 {
    60
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionRow {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub points: i32,
    pub position: i32,
}

/// A question as shown to a student taking the exam: no answer key.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: i32,
    pub position: i32,
}

impl From<QuestionRow> for PublicQuestion {
    fn from(q: QuestionRow) -> Self {
        Self { id: q.id, kind: q.kind, prompt: q.prompt, options: q.options, points: q.points, position: q.position }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    pub points: i32,
    #[serde(default)]
    pub position: Option<i32>,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate exam metadata.
///
/// # Errors
///
/// Returns `Invalid` describing the first problem found.
pub fn validate_exam(input: &ExamInput) -> Result<(), ExamError> {
    if input.title.trim().is_empty() {
        return Err(ExamError::Invalid("title is required".into()));
    }
    if input.duration_minutes <= 0 {
        return Err(ExamError::Invalid("duration_minutes must be positive".into()));
    }
    if !(0..=100).contains(&input.passing_score) {
        return Err(ExamError::Invalid("passing_score must be between 0 and 100".into()));
    }
    if let (Some(from), Some(until)) = (input.available_from, input.available_until) {
        if from >= until {
            return Err(ExamError::Invalid("available_from must be before available_until".into()));
        }
    }
    Ok(())
}

/// Validate a question and return the answer key in its stored form.
///
/// Checkbox keys are canonicalized to a sorted JSON array so equal selections
/// always store identically.
///
/// # Errors
///
/// Returns `Invalid` describing the first problem found.
pub fn validate_question(input: &QuestionInput) -> Result<Option<String>, ExamError> {
    if input.prompt.trim().is_empty() {
        return Err(ExamError::Invalid("prompt is required".into()));
    }
    if input.points <= 0 {
        return Err(ExamError::Invalid("points must be positive".into()));
    }

    if input.kind == QuestionKind::Essay {
        return Ok(None);
    }

    if input.options.len() < 2 {
        return Err(ExamError::Invalid("choice questions need at least two options".into()));
    }
    if input.options.iter().any(|o| o.trim().is_empty()) {
        return Err(ExamError::Invalid("options must not be blank".into()));
    }
    let mut seen = std::collections::HashSet::new();
    if !input.options.iter().all(|o| seen.insert(o.as_str())) {
        return Err(ExamError::Invalid("options must be unique".into()));
    }

    let key = input
        .correct_answer
        .as_deref()
        .ok_or_else(|| ExamError::Invalid("correct_answer is required".into()))?;

    match input.kind {
        QuestionKind::MultipleChoice => {
            if !input.options.iter().any(|o| o == key) {
                return Err(ExamError::Invalid("correct_answer must be one of the options".into()));
            }
            Ok(Some(key.to_owned()))
        }
        QuestionKind::MultipleCheckboxes => {
            let selection = parse_selection(key)
                .ok_or_else(|| ExamError::Invalid("correct_answer must be a JSON array of options".into()))?;
            if selection.is_empty() {
                return Err(ExamError::Invalid("correct_answer must select at least one option".into()));
            }
            if let Some(unknown) = selection.iter().find(|s| !input.options.contains(s)) {
                return Err(ExamError::Invalid(format!("unknown option in correct_answer: {unknown}")));
            }
            let canonical = serde_json::to_string(&selection.into_iter().collect::<Vec<_>>())
                .map_err(|e| ExamError::Invalid(e.to_string()))?;
            Ok(Some(canonical))
        }
        QuestionKind::Essay => Ok(None),
    }
}

// =============================================================================
// FOLDERS
// =============================================================================

fn row_to_folder(r: &PgRow) -> Result<FolderRow, sqlx::Error> {
    Ok(FolderRow {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        created_by: r.try_get("created_by")?,
        exam_count: r.try_get("exam_count")?,
        created_at: r.try_get("created_at")?,
    })
}

/// Create an exam folder.
///
/// # Errors
///
/// Returns `Invalid` for a blank name or a database error.
pub async fn create_folder(pool: &PgPool, actor_id: Uuid, name: &str) -> Result<FolderRow, ExamError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ExamError::Invalid("folder name is required".into()));
    }
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        "INSERT INTO exam_folders (name, created_by) VALUES ($1, $2)
         RETURNING id, name, created_by, 0::bigint AS exam_count, created_at",
    )
    .bind(name)
    .bind(actor_id)
    .fetch_one(tx.as_mut())
    .await?;
    let folder = row_to_folder(&row)?;

    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "folder.create",
        "exam_folder",
        Some(folder.id),
        serde_json::json!({ "name": name }),
    )
    .await?;
    tx.commit().await?;
    Ok(folder)
}

/// List folders with their exam counts.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_folders(pool: &PgPool) -> Result<Vec<FolderRow>, ExamError> {
    let rows = sqlx::query(
        "SELECT f.id, f.name, f.created_by, f.created_at,
                (SELECT COUNT(*) FROM examinations e WHERE e.folder_id = f.id) AS exam_count
           FROM exam_folders f
          ORDER BY f.name ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_folder).collect::<Result<Vec<_>, _>>()?)
}

/// Rename a folder.
///
/// # Errors
///
/// Returns `Invalid`, `FolderNotFound`, or a database error.
pub async fn rename_folder(pool: &PgPool, actor_id: Uuid, folder_id: Uuid, name: &str) -> Result<(), ExamError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ExamError::Invalid("folder name is required".into()));
    }
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE exam_folders SET name = $2 WHERE id = $1")
        .bind(folder_id)
        .bind(name)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ExamError::FolderNotFound(folder_id));
    }
    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "folder.rename",
        "exam_folder",
        Some(folder_id),
        serde_json::json!({ "name": name }),
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Delete a folder. Its exams stay, detached from any folder.
///
/// # Errors
///
/// Returns `FolderNotFound` or a database error.
pub async fn delete_folder(pool: &PgPool, actor_id: Uuid, folder_id: Uuid) -> Result<(), ExamError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM exam_folders WHERE id = $1")
        .bind(folder_id)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ExamError::FolderNotFound(folder_id));
    }
    activity::log_admin_activity(tx.as_mut(), actor_id, "folder.delete", "exam_folder", Some(folder_id), serde_json::json!({}))
        .await?;
    tx.commit().await?;
    Ok(())
}

// =============================================================================
// EXAMS
// =============================================================================

const EXAM_SELECT: &str = r"
    SELECT e.id, e.folder_id, e.title, e.description, e.duration_minutes, e.passing_score,
           e.is_published, e.available_from, e.available_until, e.created_by,
           e.created_at, e.updated_at,
           (SELECT COUNT(*) FROM exam_questions q WHERE q.exam_id = e.id) AS question_count,
           (SELECT COALESCE(SUM(q.points), 0)::bigint FROM exam_questions q WHERE q.exam_id = e.id) AS total_points
      FROM examinations e";

fn row_to_exam(r: &PgRow) -> Result<ExamRow, sqlx::Error> {
    Ok(ExamRow {
        id: r.try_get("id")?,
        folder_id: r.try_get("folder_id")?,
        title: r.try_get("title")?,
        description: r.try_get("description")?,
        duration_minutes: r.try_get("duration_minutes")?,
        passing_score: r.try_get("passing_score")?,
        is_published: r.try_get("is_published")?,
        available_from: r.try_get("available_from")?,
        available_until: r.try_get("available_until")?,
        created_by: r.try_get("created_by")?,
        question_count: r.try_get("question_count")?,
        total_points: r.try_get("total_points")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn folder_violation(err: sqlx::Error, folder_id: Option<Uuid>) -> ExamError {
    let is_fk = err
        .as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation());
    match (is_fk, folder_id) {
        (true, Some(id)) => ExamError::FolderNotFound(id),
        _ => ExamError::Database(err),
    }
}

/// Create a draft exam.
///
/// # Errors
///
/// Returns `Invalid`, `FolderNotFound`, or a database error.
pub async fn create_exam(pool: &PgPool, actor_id: Uuid, input: &ExamInput) -> Result<ExamRow, ExamError> {
    validate_exam(input)?;
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        r"INSERT INTO examinations
              (title, description, duration_minutes, passing_score, folder_id, available_from, available_until, created_by)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
          RETURNING id",
    )
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.duration_minutes)
    .bind(input.passing_score)
    .bind(input.folder_id)
    .bind(input.available_from)
    .bind(input.available_until)
    .bind(actor_id)
    .fetch_one(tx.as_mut())
    .await
    .map_err(|e| folder_violation(e, input.folder_id))?;
    let exam_id: Uuid = row.try_get("id")?;

    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "exam.create",
        "examination",
        Some(exam_id),
        serde_json::json!({ "title": input.title }),
    )
    .await?;
    tx.commit().await?;

    info!(%exam_id, %actor_id, "exam created");
    get_exam(pool, exam_id).await
}

/// List exams, optionally restricted to one folder and/or published ones.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_exams(pool: &PgPool, folder_id: Option<Uuid>, published_only: bool) -> Result<Vec<ExamRow>, ExamError> {
    let rows = sqlx::query(&format!(
        "{EXAM_SELECT}
          WHERE ($1::uuid IS NULL OR e.folder_id = $1)
            AND (NOT $2 OR e.is_published)
          ORDER BY e.created_at DESC"
    ))
    .bind(folder_id)
    .bind(published_only)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_exam).collect::<Result<Vec<_>, _>>()?)
}

/// Fetch one exam.
///
/// # Errors
///
/// Returns `NotFound` or a database error.
pub async fn get_exam<'e, E>(executor: E, exam_id: Uuid) -> Result<ExamRow, ExamError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!("{EXAM_SELECT} WHERE e.id = $1"))
        .bind(exam_id)
        .fetch_optional(executor)
        .await?
        .ok_or(ExamError::NotFound(exam_id))?;
    Ok(row_to_exam(&row)?)
}

/// Replace an exam's metadata.
///
/// Once any attempt exists the duration is frozen along with the questions,
/// since live timers are computed from it.
///
/// # Errors
///
/// Returns `Invalid`, `NotFound`, `FolderNotFound`, `Locked`, or a database
/// error.
pub async fn update_exam(pool: &PgPool, actor_id: Uuid, exam_id: Uuid, input: &ExamInput) -> Result<ExamRow, ExamError> {
    validate_exam(input)?;
    let mut tx = pool.begin().await?;
    let lock = lock_exam(tx.as_mut(), exam_id).await?;
    if !lock.allows_duration(input.duration_minutes) {
        return Err(ExamError::Locked(exam_id));
    }

    sqlx::query(
        r"UPDATE examinations
             SET title = $2, description = $3, duration_minutes = $4, passing_score = $5,
                 folder_id = $6, available_from = $7, available_until = $8, updated_at = now()
           WHERE id = $1",
    )
    .bind(exam_id)
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.duration_minutes)
    .bind(input.passing_score)
    .bind(input.folder_id)
    .bind(input.available_from)
    .bind(input.available_until)
    .execute(tx.as_mut())
    .await
    .map_err(|e| folder_violation(e, input.folder_id))?;

    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "exam.update",
        "examination",
        Some(exam_id),
        serde_json::json!({ "title": input.title }),
    )
    .await?;
    tx.commit().await?;
    get_exam(pool, exam_id).await
}

/// Delete an exam with its questions, submissions, and answers.
///
/// # Errors
///
/// Returns `NotFound` or a database error.
pub async fn delete_exam(pool: &PgPool, actor_id: Uuid, exam_id: Uuid) -> Result<(), ExamError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM examinations WHERE id = $1")
        .bind(exam_id)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ExamError::NotFound(exam_id));
    }
    activity::log_admin_activity(tx.as_mut(), actor_id, "exam.delete", "examination", Some(exam_id), serde_json::json!({}))
        .await?;
    tx.commit().await?;
    info!(%exam_id, %actor_id, "exam deleted");
    Ok(())
}

/// Publish or unpublish an exam. Publishing requires at least one question.
///
/// # Errors
///
/// Returns `Invalid`, `NotFound`, or a database error.
pub async fn set_published(pool: &PgPool, actor_id: Uuid, exam_id: Uuid, published: bool) -> Result<ExamRow, ExamError> {
    let mut tx = pool.begin().await?;
    lock_exam(tx.as_mut(), exam_id).await?;
    let question_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(tx.as_mut())
        .await?;
    if published && question_count == 0 {
        return Err(ExamError::Invalid("cannot publish an exam without questions".into()));
    }
    sqlx::query("UPDATE examinations SET is_published = $2, updated_at = now() WHERE id = $1")
        .bind(exam_id)
        .bind(published)
        .execute(tx.as_mut())
        .await?;

    let action = if published { "exam.publish" } else { "exam.unpublish" };
    activity::log_admin_activity(tx.as_mut(), actor_id, action, "examination", Some(exam_id), serde_json::json!({})).await?;
    tx.commit().await?;
    get_exam(pool, exam_id).await
}

// =============================================================================
// QUESTIONS
// =============================================================================

const QUESTION_COLUMNS: &str = "id, exam_id, kind, prompt, options, correct_answer, points, position";

fn row_to_question(r: &PgRow) -> Result<QuestionRow, sqlx::Error> {
    let kind: String = r.try_get("kind")?;
    let options: Json<Vec<String>> = r.try_get("options")?;
    Ok(QuestionRow {
        id: r.try_get("id")?,
        exam_id: r.try_get("exam_id")?,
        kind: QuestionKind::decode(&kind)?,
        prompt: r.try_get("prompt")?,
        options: options.0,
        correct_answer: r.try_get("correct_answer")?,
        points: r.try_get("points")?,
        position: r.try_get("position")?,
    })
}

/// What an edit needs to know about an exam it holds the row lock on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExamLock {
    duration_minutes: i32,
    has_submissions: bool,
}

impl ExamLock {
    fn ensure_unlocked(self, exam_id: Uuid) -> Result<(), ExamError> {
        if self.has_submissions { Err(ExamError::Locked(exam_id)) } else { Ok(()) }
    }

    fn allows_duration(self, duration_minutes: i32) -> bool {
        !self.has_submissions || duration_minutes == self.duration_minutes
    }
}

/// Take `FOR UPDATE` on the exam row, then check for attempts. Claims take
/// `FOR SHARE` on the same row, so none can start until the edit commits.
async fn lock_exam(conn: &mut PgConnection, exam_id: Uuid) -> Result<ExamLock, ExamError> {
    let duration_minutes: i32 = sqlx::query_scalar("SELECT duration_minutes FROM examinations WHERE id = $1 FOR UPDATE")
        .bind(exam_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ExamError::NotFound(exam_id))?;
    // Separate statement: it must see attempts committed while we waited.
    let has_submissions: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM exam_submissions WHERE exam_id = $1)")
        .bind(exam_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(ExamLock { duration_minutes, has_submissions })
}

/// List an exam's questions in display order, answer keys included.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_questions(pool: &PgPool, exam_id: Uuid) -> Result<Vec<QuestionRow>, ExamError> {
    let rows = sqlx::query(&format!(
        "SELECT {QUESTION_COLUMNS} FROM exam_questions WHERE exam_id = $1 ORDER BY position ASC, created_at ASC"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_question).collect::<Result<Vec<_>, _>>()?)
}

/// Append a question to an exam.
///
/// # Errors
///
/// Returns `Invalid`, `NotFound`, `Locked`, or a database error.
pub async fn add_question(pool: &PgPool, actor_id: Uuid, exam_id: Uuid, input: &QuestionInput) -> Result<QuestionRow, ExamError> {
    let key = validate_question(input)?;
    let mut tx = pool.begin().await?;
    lock_exam(tx.as_mut(), exam_id).await?.ensure_unlocked(exam_id)?;

    let row = sqlx::query(&format!(
        r"INSERT INTO exam_questions (exam_id, kind, prompt, options, correct_answer, points, position)
          VALUES ($1, $2, $3, $4, $5, $6,
                  COALESCE($7, (SELECT COALESCE(MAX(position) + 1, 0) FROM exam_questions WHERE exam_id = $1)))
          RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(exam_id)
    .bind(input.kind.as_str())
    .bind(input.prompt.trim())
    .bind(Json(stored_options(input)))
    .bind(key)
    .bind(input.points)
    .bind(input.position)
    .fetch_one(tx.as_mut())
    .await?;
    let question = row_to_question(&row)?;

    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "question.create",
        "exam_question",
        Some(question.id),
        serde_json::json!({ "exam_id": exam_id, "kind": input.kind.as_str() }),
    )
    .await?;
    tx.commit().await?;
    Ok(question)
}

/// Replace a question.
///
/// # Errors
///
/// Returns `Invalid`, `QuestionNotFound`, `Locked`, or a database error.
pub async fn update_question(
    pool: &PgPool,
    actor_id: Uuid,
    exam_id: Uuid,
    question_id: Uuid,
    input: &QuestionInput,
) -> Result<QuestionRow, ExamError> {
    let key = validate_question(input)?;
    let mut tx = pool.begin().await?;
    lock_exam(tx.as_mut(), exam_id).await?.ensure_unlocked(exam_id)?;

    let row = sqlx::query(&format!(
        r"UPDATE exam_questions
             SET kind = $3, prompt = $4, options = $5, correct_answer = $6, points = $7,
                 position = COALESCE($8, position)
           WHERE id = $1 AND exam_id = $2
          RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(question_id)
    .bind(exam_id)
    .bind(input.kind.as_str())
    .bind(input.prompt.trim())
    .bind(Json(stored_options(input)))
    .bind(key)
    .bind(input.points)
    .bind(input.position)
    .fetch_optional(tx.as_mut())
    .await?
    .ok_or(ExamError::QuestionNotFound(question_id))?;
    let question = row_to_question(&row)?;

    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "question.update",
        "exam_question",
        Some(question_id),
        serde_json::json!({ "exam_id": exam_id }),
    )
    .await?;
    tx.commit().await?;
    Ok(question)
}

/// Delete a question.
///
/// # Errors
///
/// Returns `QuestionNotFound`, `Locked`, or a database error.
pub async fn delete_question(pool: &PgPool, actor_id: Uuid, exam_id: Uuid, question_id: Uuid) -> Result<(), ExamError> {
    let mut tx = pool.begin().await?;
    lock_exam(tx.as_mut(), exam_id).await?.ensure_unlocked(exam_id)?;
    let result = sqlx::query("DELETE FROM exam_questions WHERE id = $1 AND exam_id = $2")
        .bind(question_id)
        .bind(exam_id)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ExamError::QuestionNotFound(question_id));
    }
    activity::log_admin_activity(
        tx.as_mut(),
        actor_id,
        "question.delete",
        "exam_question",
        Some(question_id),
        serde_json::json!({ "exam_id": exam_id }),
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

fn stored_options(input: &QuestionInput) -> Vec<String> {
    if input.kind == QuestionKind::Essay { Vec::new() } else { input.options.clone() }
}

#[cfg(test)]
#[path = "exam_test.rs"]
mod tests;
