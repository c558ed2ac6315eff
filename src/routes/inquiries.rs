//! Inquiry routes. Students see their own; admins see and handle all.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AuthUser, require_role};
use crate::services::inquiry::{self, InquiryError, InquiryRow, InquiryStatus};
use crate::services::user::Role;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateInquiryBody {
    pub subject: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListInquiriesQuery {
    pub status: Option<InquiryStatus>,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub status: InquiryStatus,
    pub response: Option<String>,
}

fn is_admin(auth: &AuthUser) -> bool {
    auth.user.role.satisfies(Role::Admin)
}

/// `GET /api/inquiries?status=`
pub async fn list_inquiries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListInquiriesQuery>,
) -> Result<Json<Vec<InquiryRow>>, StatusCode> {
    let owner = if is_admin(&auth) { None } else { Some(auth.user.id) };
    let rows = inquiry::list_inquiries(&state.pool, owner, query.status)
        .await
        .map_err(inquiry_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/inquiries`
pub async fn create_inquiry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateInquiryBody>,
) -> Result<(StatusCode, Json<InquiryRow>), StatusCode> {
    let row = inquiry::create_inquiry(&state.pool, auth.user.id, &body.subject, &body.message)
        .await
        .map_err(inquiry_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/inquiries/:id` — owners and admins only.
pub async fn get_inquiry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(inquiry_id): Path<Uuid>,
) -> Result<Json<InquiryRow>, StatusCode> {
    let row = inquiry::get_inquiry(&state.pool, inquiry_id)
        .await
        .map_err(inquiry_error_to_status)?;
    // Hide other users' inquiries behind 404 rather than 403.
    if row.user_id != auth.user.id && !is_admin(&auth) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(row))
}

/// `POST /api/inquiries/:id/transition` — `{ "status": ..., "response": ... }`.
pub async fn transition_inquiry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(inquiry_id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<InquiryRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = inquiry::transition(&state.pool, auth.user.id, inquiry_id, body.status, body.response.as_deref())
        .await
        .map_err(inquiry_error_to_status)?;
    Ok(Json(row))
}

pub(crate) fn inquiry_error_to_status(err: InquiryError) -> StatusCode {
    match err {
        InquiryError::NotFound(_) => StatusCode::NOT_FOUND,
        InquiryError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InquiryError::InvalidTransition { .. } | InquiryError::Conflict(_) => StatusCode::CONFLICT,
        InquiryError::Database(e) => {
            tracing::error!(error = %e, "inquiry operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_error_to_status_maps_each_variant() {
        assert_eq!(inquiry_error_to_status(InquiryError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(inquiry_error_to_status(InquiryError::Invalid("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            inquiry_error_to_status(InquiryError::InvalidTransition { from: "closed", to: "open" }),
            StatusCode::CONFLICT
        );
        assert_eq!(inquiry_error_to_status(InquiryError::Conflict(Uuid::nil())), StatusCode::CONFLICT);
    }

    #[test]
    fn transition_body_parses_snake_case_status() {
        let body: TransitionBody = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(body.status, InquiryStatus::InProgress);
        assert!(body.response.is_none());
    }
}
