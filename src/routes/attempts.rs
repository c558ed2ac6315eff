//! Student routes — dashboard, taking an exam, results.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AuthUser, require_role};
use super::exams::exam_error_to_status;
use crate::services::reports::{self, StudentResult};
use crate::services::submission::{self, ExamSession, SaveAck, StudentExamEntry, SubmissionError, SubmissionRow};
use crate::services::user::Role;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AnswerBody {
    /// A string for choice and essay questions, or an array of option
    /// strings for checkbox questions.
    pub answer: serde_json::Value,
}

/// Normalize an answer payload into its stored text form.
///
/// Checkbox selections are stored as a JSON array string.
pub(crate) fn answer_text(value: serde_json::Value) -> Result<String, StatusCode> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Array(items) => {
            if items.iter().all(serde_json::Value::is_string) {
                serde_json::to_string(&items).map_err(|_| StatusCode::BAD_REQUEST)
            } else {
                Err(StatusCode::BAD_REQUEST)
            }
        }
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

/// `GET /api/student/exams` — published exams with the caller's attempt status.
pub async fn list_my_exams(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<StudentExamEntry>>, StatusCode> {
    require_role(&auth, Role::Student)?;
    let rows = submission::list_student_exams(&state.pool, auth.user.id)
        .await
        .map_err(submission_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/student/results` — the caller's finished submissions.
pub async fn my_results(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<StudentResult>>, StatusCode> {
    require_role(&auth, Role::Student)?;
    let rows = reports::student_results(&state.pool, auth.user.id).await.map_err(|e| {
        tracing::error!(error = %e, "student results failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(rows))
}

/// `POST /api/exams/:id/start` — claim (or resume) the caller's attempt.
pub async fn start_exam(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<ExamSession>, StatusCode> {
    require_role(&auth, Role::Student)?;
    let session = submission::start_exam(&state, exam_id, auth.user.id)
        .await
        .map_err(submission_error_to_status)?;
    Ok(Json(session))
}

/// `PUT /api/attempts/:id/answers/:question_id` — buffered autosave.
pub async fn save_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((submission_id, question_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<AnswerBody>,
) -> Result<Json<SaveAck>, StatusCode> {
    require_role(&auth, Role::Student)?;
    let answer = answer_text(body.answer)?;
    let ack = submission::save_answer(&state, submission_id, auth.user.id, question_id, answer)
        .await
        .map_err(submission_error_to_status)?;
    Ok(Json(ack))
}

/// `POST /api/attempts/:id/submit`
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<SubmissionRow>, StatusCode> {
    require_role(&auth, Role::Student)?;
    let row = submission::submit(&state, submission_id, auth.user.id)
        .await
        .map_err(submission_error_to_status)?;
    Ok(Json(row))
}

pub(crate) fn submission_error_to_status(err: SubmissionError) -> StatusCode {
    match err {
        SubmissionError::ExamNotFound(_) | SubmissionError::NotFound(_) => StatusCode::NOT_FOUND,
        SubmissionError::NotAvailable(_) => StatusCode::FORBIDDEN,
        SubmissionError::NotInProgress(_) | SubmissionError::TimeExpired(_) => StatusCode::CONFLICT,
        SubmissionError::UnknownQuestion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionError::Exam(e) => exam_error_to_status(e),
        SubmissionError::Database(e) => {
            tracing::error!(error = %e, "submission operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_text_keeps_plain_strings() {
        assert_eq!(answer_text(json!("Paris")).unwrap(), "Paris");
        assert_eq!(answer_text(json!(null)).unwrap(), "");
    }

    #[test]
    fn answer_text_serializes_checkbox_selections() {
        assert_eq!(answer_text(json!(["b", "a"])).unwrap(), r#"["b","a"]"#);
        assert_eq!(answer_text(json!([])).unwrap(), "[]");
    }

    #[test]
    fn answer_text_rejects_other_shapes() {
        assert_eq!(answer_text(json!(3)), Err(StatusCode::BAD_REQUEST));
        assert_eq!(answer_text(json!([1, 2])), Err(StatusCode::BAD_REQUEST));
        assert_eq!(answer_text(json!({"a": 1})), Err(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn submission_error_to_status_maps_lifecycle_errors() {
        let id = Uuid::nil();
        assert_eq!(submission_error_to_status(SubmissionError::NotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(submission_error_to_status(SubmissionError::NotAvailable(id)), StatusCode::FORBIDDEN);
        assert_eq!(submission_error_to_status(SubmissionError::NotInProgress(id)), StatusCode::CONFLICT);
        assert_eq!(submission_error_to_status(SubmissionError::TimeExpired(id)), StatusCode::CONFLICT);
        assert_eq!(
            submission_error_to_status(SubmissionError::UnknownQuestion(id)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
