//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API under a single Axum router. Role
//! dashboards (super admin, admin, student) are clients of these endpoints;
//! every handler authenticates through the session cookie and checks the
//! caller's role before touching a service.

pub mod admin;
pub mod attempts;
pub mod auth;
pub mod exams;
pub mod grading;
pub mod inquiries;
pub mod users;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Super admin: accounts, settings, audit trail.
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/dashboard", get(admin::dashboard))
        .route("/api/activity", get(admin::list_activity))
        .route("/api/settings", get(admin::list_settings))
        .route("/api/settings/{key}", get(admin::get_setting).put(admin::put_setting))
        // Admin: authoring.
        .route("/api/folders", get(exams::list_folders).post(exams::create_folder))
        .route(
            "/api/folders/{id}",
            patch(exams::rename_folder).delete(exams::delete_folder),
        )
        .route("/api/exams", get(exams::list_exams).post(exams::create_exam))
        .route(
            "/api/exams/{id}",
            get(exams::get_exam)
                .patch(exams::update_exam)
                .delete(exams::delete_exam),
        )
        .route("/api/exams/{id}/publish", post(exams::publish_exam))
        .route(
            "/api/exams/{id}/questions",
            get(exams::list_questions).post(exams::add_question),
        )
        .route(
            "/api/exams/{id}/questions/{question_id}",
            patch(exams::update_question).delete(exams::delete_question),
        )
        // Admin: grading and analytics.
        .route("/api/exams/{id}/submissions", get(grading::list_submissions))
        .route("/api/exams/{id}/report", get(grading::exam_report))
        .route("/api/submissions/{id}", get(grading::submission_detail))
        .route(
            "/api/submissions/{id}/answers/{question_id}/grade",
            put(grading::grade_answer),
        )
        // Student: taking exams.
        .route("/api/student/exams", get(attempts::list_my_exams))
        .route("/api/student/results", get(attempts::my_results))
        .route("/api/exams/{id}/start", post(attempts::start_exam))
        .route(
            "/api/attempts/{id}/answers/{question_id}",
            put(attempts::save_answer),
        )
        .route("/api/attempts/{id}/submit", post(attempts::submit))
        // Everyone: inquiries.
        .route(
            "/api/inquiries",
            get(inquiries::list_inquiries).post(inquiries::create_inquiry),
        )
        .route("/api/inquiries/{id}", get(inquiries::get_inquiry))
        .route("/api/inquiries/{id}/transition", post(inquiries::transition_inquiry))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
