//! Super-admin routes — dashboard counters, activity log, system settings.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use super::auth::{AuthUser, require_role};
use crate::services::activity::{self, ActivityLogRow};
use crate::services::reports::{self, DashboardCounts};
use crate::services::settings::{self, SettingRow, SettingsError};
use crate::services::user::Role;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct SettingBody {
    pub value: serde_json::Value,
}

fn internal(context: &'static str) -> impl FnOnce(sqlx::Error) -> StatusCode {
    move |e| {
        tracing::error!(error = %e, context, "admin query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// `GET /api/dashboard`
pub async fn dashboard(State(state): State<AppState>, auth: AuthUser) -> Result<Json<DashboardCounts>, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let counts = reports::dashboard_counts(&state.pool).await.map_err(internal("dashboard"))?;
    Ok(Json(counts))
}

/// `GET /api/activity?limit=&offset=` — newest first.
pub async fn list_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<ActivityLogRow>>, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let (limit, offset) = activity::clamp_page(page.limit, page.offset);
    let rows = activity::list_activity(&state.pool, limit, offset)
        .await
        .map_err(internal("activity"))?;
    Ok(Json(rows))
}

/// `GET /api/settings` — readable by any admin.
pub async fn list_settings(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<SettingRow>>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let rows = settings::list_settings(&state.pool).await.map_err(settings_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/settings/:key`
pub async fn get_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<SettingRow>, StatusCode> {
    require_role(&auth, Role::Admin)?;
    let row = settings::get_setting(&state.pool, &key).await.map_err(settings_error_to_status)?;
    Ok(Json(row))
}

/// `PUT /api/settings/:key` — `{ "value": <any JSON> }`.
pub async fn put_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> Result<Json<SettingRow>, StatusCode> {
    require_role(&auth, Role::SuperAdmin)?;
    let row = settings::upsert_setting(&state.pool, auth.user.id, &key, body.value)
        .await
        .map_err(settings_error_to_status)?;
    Ok(Json(row))
}

pub(crate) fn settings_error_to_status(err: SettingsError) -> StatusCode {
    match err {
        SettingsError::NotFound(_) => StatusCode::NOT_FOUND,
        SettingsError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        SettingsError::Database(e) => {
            tracing::error!(error = %e, "settings operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_error_to_status_maps_each_variant() {
        assert_eq!(settings_error_to_status(SettingsError::NotFound("k".into())), StatusCode::NOT_FOUND);
        assert_eq!(settings_error_to_status(SettingsError::InvalidKey("K K".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            settings_error_to_status(SettingsError::Database(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_maps_to_500() {
        assert_eq!(internal("test")(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
