//! User account management routes (super admin only).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AuthUser, require_role};
use crate::services::user::{self, NewUser, Role, UserError, UserRow, UserUpdate};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
}

/// `GET /api/users` — list accounts, optionally filtered by `?role=`.
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserRow>>, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let role = match query.role.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(Role::parse(raw).ok_or(StatusCode::BAD_REQUEST)?),
    };
    let rows = user::list_users(&state.pool, role).await.map_err(user_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/users` — create an account.
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<UserRow>), StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let row = user::create_user(&state.pool, Some(auth.user.id), &body)
        .await
        .map_err(user_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/users/:id`
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRow>, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let row = user::get_user(&state.pool, user_id).await.map_err(user_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/users/:id` — rename, change role, (de)activate, reset password.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<UserRow>, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let row = user::update_user(&state.pool, auth.user.id, user_id, &body)
        .await
        .map_err(user_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/users/:id`
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    user::delete_user(&state.pool, auth.user.id, user_id)
        .await
        .map_err(user_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn user_error_to_status(err: UserError) -> StatusCode {
    match err {
        UserError::InvalidEmail | UserError::WeakPassword => StatusCode::BAD_REQUEST,
        UserError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        UserError::EmailTaken => StatusCode::CONFLICT,
        UserError::NotFound(_) => StatusCode::NOT_FOUND,
        UserError::SelfModification => StatusCode::FORBIDDEN,
        UserError::Hash(_) | UserError::Database(_) => {
            tracing::error!(error = %err, "user operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_to_status_maps_client_errors() {
        assert_eq!(user_error_to_status(UserError::WeakPassword), StatusCode::BAD_REQUEST);
        assert_eq!(user_error_to_status(UserError::EmailTaken), StatusCode::CONFLICT);
        assert_eq!(user_error_to_status(UserError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(user_error_to_status(UserError::SelfModification), StatusCode::FORBIDDEN);
    }

    #[test]
    fn user_error_to_status_maps_internal_errors() {
        assert_eq!(user_error_to_status(UserError::Hash("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            user_error_to_status(UserError::Database(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
