//! Exam authoring routes — folders, examinations, questions (admin).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AuthUser, require_role};
use crate::services::exam::{self, ExamError, ExamInput, ExamRow, FolderRow, QuestionInput, QuestionRow};
use crate::services::user::Role;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FolderBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ListExamsQuery {
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Deserialize)]
pub struct PublishBody {
    pub published: bool,
}

// =============================================================================
// FOLDERS
// =============================================================================

/// `GET /api/folders`
pub async fn list_folders(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<FolderRow>>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let rows = exam::list_folders(&state.pool).await.map_err(exam_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/folders`
pub async fn create_folder(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<FolderBody>,
) -> Result<(StatusCode, Json<FolderRow>), StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::create_folder(&state.pool, auth.user.id, &body.name)
        .await
        .map_err(exam_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/folders/:id`
pub async fn rename_folder(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(folder_id): Path<Uuid>,
    Json(body): Json<FolderBody>,
) -> Result<StatusCode, StatusCode> {
    require_role(&auth, Role::Admin)?;
    exam::rename_folder(&state.pool, auth.user.id, folder_id, &body.name)
        .await
        .map_err(exam_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/folders/:id` — exams in the folder are detached, not deleted.
pub async fn delete_folder(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(folder_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_role(&auth, Role::Admin)?;
    exam::delete_folder(&state.pool, auth.user.id, folder_id)
        .await
        .map_err(exam_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EXAMS
// =============================================================================

/// `GET /api/exams?folder_id=&published=`
pub async fn list_exams(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListExamsQuery>,
) -> Result<Json<Vec<ExamRow>>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let rows = exam::list_exams(&state.pool, query.folder_id, query.published)
        .await
        .map_err(exam_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/exams`
pub async fn create_exam(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ExamInput>,
) -> Result<(StatusCode, Json<ExamRow>), StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::create_exam(&state.pool, auth.user.id, &body)
        .await
        .map_err(exam_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/exams/:id`
pub async fn get_exam(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<ExamRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::get_exam(&state.pool, exam_id).await.map_err(exam_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/exams/:id` — 409 when changing the duration of an exam with attempts.
pub async fn update_exam(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
    Json(body): Json<ExamInput>,
) -> Result<Json<ExamRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::update_exam(&state.pool, auth.user.id, exam_id, &body)
        .await
        .map_err(exam_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/exams/:id`
pub async fn delete_exam(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_role(&auth, Role::Admin)?;
    exam::delete_exam(&state.pool, auth.user.id, exam_id)
        .await
        .map_err(exam_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/exams/:id/publish` — `{ "published": bool }`.
pub async fn publish_exam(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
    Json(body): Json<PublishBody>,
) -> Result<Json<ExamRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::set_published(&state.pool, auth.user.id, exam_id, body.published)
        .await
        .map_err(exam_error_to_status)?;
    Ok(Json(row))
}

// =============================================================================
// QUESTIONS
// =============================================================================

/// `GET /api/exams/:id/questions` — includes answer keys.
pub async fn list_questions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<Vec<QuestionRow>>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let rows = exam::list_questions(&state.pool, exam_id).await.map_err(exam_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/exams/:id/questions`
pub async fn add_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exam_id): Path<Uuid>,
    Json(body): Json<QuestionInput>,
) -> Result<(StatusCode, Json<QuestionRow>), StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::add_question(&state.pool, auth.user.id, exam_id, &body)
        .await
        .map_err(exam_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/exams/:id/questions/:question_id`
pub async fn update_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((exam_id, question_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<QuestionInput>,
) -> Result<Json<QuestionRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = exam::update_question(&state.pool, auth.user.id, exam_id, question_id, &body)
        .await
        .map_err(exam_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/exams/:id/questions/:question_id`
pub async fn delete_question(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((exam_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, StatusCode> {
    require_role(&auth, Role::Admin)?;
    exam::delete_question(&state.pool, auth.user.id, exam_id, question_id)
        .await
        .map_err(exam_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn exam_error_to_status(err: ExamError) -> StatusCode {
    match err {
        ExamError::NotFound(_) | ExamError::QuestionNotFound(_) | ExamError::FolderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ExamError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExamError::Locked(_) => StatusCode::CONFLICT,
        ExamError::Database(e) => {
            tracing::error!(error = %e, "exam operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_error_to_status_maps_missing_rows() {
        assert_eq!(exam_error_to_status(ExamError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(exam_error_to_status(ExamError::QuestionNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(exam_error_to_status(ExamError::FolderNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn exam_error_to_status_maps_validation_and_lock() {
        assert_eq!(exam_error_to_status(ExamError::Invalid("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(exam_error_to_status(ExamError::Locked(Uuid::nil())), StatusCode::CONFLICT);
    }
}
