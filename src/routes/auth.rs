//! Auth routes — password login, session cookie, role checks.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::services::session::{self, SessionUser};
use crate::services::user::{self, Role, UserError};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token, app_state.config.session_idle_timeout)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "session validation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Reject the request unless the caller's role satisfies `required`.
///
/// # Errors
///
/// Returns `403 Forbidden` when the role is insufficient.
pub fn require_role(auth: &AuthUser, required: Role) -> Result<(), StatusCode> {
    if auth.user.role.satisfies(required) { Ok(()) } else { Err(StatusCode::FORBIDDEN) }
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login` — check credentials, create a session, set the cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let account = user::verify_credentials(&state.pool, &body.email, &body.password)
        .await
        .map_err(login_error_to_status)?;

    let token = session::create_session(&state.pool, account.id).await.map_err(|e| {
        tracing::error!(error = %e, "session creation failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    tracing::info!(user_id = %account.id, role = account.role.as_str(), "login");

    let jar = jar.add(session_cookie(token, state.config.cookie_secure));
    let me = SessionUser { id: account.id, email: account.email, name: account.name, role: account.role };
    Ok((jar, Json(me)))
}

/// `GET /api/auth/me` — return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed on logout");
    }

    let mut cookie = session_cookie(String::new(), state.config.cookie_secure);
    cookie.set_max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

pub(crate) fn login_error_to_status(err: UserError) -> StatusCode {
    match err {
        UserError::InvalidCredentials | UserError::InvalidEmail => StatusCode::UNAUTHORIZED,
        other => {
            tracing::error!(error = %other, "login failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
