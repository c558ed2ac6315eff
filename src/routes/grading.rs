//! Grading and analytics routes (admin).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AuthUser, require_role};
use super::exams::exam_error_to_status;
use crate::services::grading::{self, GradingError, SubmissionDetail, SubmissionSummary};
use crate::services::reports::{self, ExamReport};
use crate::services::submission::SubmissionRow;
use crate::services::user::Role;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GradeBody {
    pub score: i32,
    pub feedback: Option<String>,
}

/// `GET /api/exams/:id/submissions`
pub async fn list_submissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionSummary>>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let rows = grading::list_submissions(&state.pool, exam_id)
        .await
        .map_err(grading_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/submissions/:id` — every question with the student's answer.
pub async fn submission_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<SubmissionDetail>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let detail = grading::submission_detail(&state.pool, submission_id)
        .await
        .map_err(grading_error_to_status)?;
    Ok(Json(detail))
}

/// `PUT /api/submissions/:id/answers/:question_id/grade`
pub async fn grade_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((submission_id, question_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<GradeBody>,
) -> Result<Json<SubmissionRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = grading::grade_answer(
        &state.pool,
        auth.user.id,
        submission_id,
        question_id,
        body.score,
        body.feedback.as_deref(),
    )
    .await
    .map_err(grading_error_to_status)?;
    Ok(Json(row))
}

/// `GET /api/exams/:id/report`
pub async fn exam_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<ExamReport>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let report = reports::exam_report(&state.pool, exam_id)
        .await
        .map_err(exam_error_to_status)?;
    Ok(Json(report))
}

pub(crate) fn grading_error_to_status(err: GradingError) -> StatusCode {
    match err {
        GradingError::SubmissionNotFound(_) | GradingError::QuestionNotFound(_) => StatusCode::NOT_FOUND,
        GradingError::NotSubmitted(_) => StatusCode::CONFLICT,
        GradingError::ScoreOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GradingError::Database(e) => {
            tracing::error!(error = %e, "grading operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_error_to_status_maps_each_variant() {
        let id = Uuid::nil();
        assert_eq!(grading_error_to_status(GradingError::SubmissionNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(grading_error_to_status(GradingError::QuestionNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(grading_error_to_status(GradingError::NotSubmitted(id)), StatusCode::CONFLICT);
        assert_eq!(
            grading_error_to_status(GradingError::ScoreOutOfRange { score: 12, max: 10 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            grading_error_to_status(GradingError::Database(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
