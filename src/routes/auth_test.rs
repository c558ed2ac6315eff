use super::*;
use axum::body::Body;
use axum::http::{Request, header};
use tower::ServiceExt;
use uuid::Uuid;

use crate::state::test_helpers;

fn auth_user(role: Role) -> AuthUser {
    AuthUser {
        user: SessionUser { id: Uuid::new_v4(), email: "u@example.com".into(), name: "U".into(), role },
        token: "t".into(),
    }
}

// =============================================================================
// require_role
// =============================================================================

#[test]
fn super_admin_passes_admin_checks() {
    assert!(require_role(&auth_user(Role::SuperAdmin), Role::Admin).is_ok());
    assert!(require_role(&auth_user(Role::SuperAdmin), Role::SuperAdmin).is_ok());
}

#[test]
fn admin_is_forbidden_from_super_admin_routes() {
    assert_eq!(require_role(&auth_user(Role::Admin), Role::SuperAdmin), Err(StatusCode::FORBIDDEN));
}

#[test]
fn student_is_forbidden_from_admin_routes() {
    assert_eq!(require_role(&auth_user(Role::Student), Role::Admin), Err(StatusCode::FORBIDDEN));
    assert!(require_role(&auth_user(Role::Student), Role::Student).is_ok());
}

// =============================================================================
// error mapping
// =============================================================================

#[test]
fn bad_credentials_map_to_unauthorized() {
    assert_eq!(login_error_to_status(UserError::InvalidCredentials), StatusCode::UNAUTHORIZED);
    assert_eq!(login_error_to_status(UserError::InvalidEmail), StatusCode::UNAUTHORIZED);
}

#[test]
fn storage_failures_map_to_internal_error() {
    let err = UserError::Database(sqlx::Error::PoolTimedOut);
    assert_eq!(login_error_to_status(err), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn session_cookie_is_http_only_and_scoped_to_root() {
    let cookie = session_cookie("abc".into(), true);
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.value(), "abc");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
}

// =============================================================================
// router
// =============================================================================

#[tokio::test]
async fn healthz_is_ok_without_auth() {
    let app = crate::routes::app(test_helpers::test_app_state());
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn me_without_cookie_is_unauthorized() {
    let app = crate::routes::app(test_helpers::test_app_state());
    let response = app
        .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn saving_an_answer_without_cookie_is_unauthorized() {
    let app = crate::routes::app(test_helpers::test_app_state());
    let uri = format!("/api/attempts/{}/answers/{}", Uuid::new_v4(), Uuid::new_v4());
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"answer":"Paris"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unreachable_session_store_is_internal_error() {
    let app = crate::routes::app(test_helpers::test_app_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, format!("{COOKIE_NAME}=deadbeef"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
