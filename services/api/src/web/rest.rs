//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, plus the health probe.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::web::{assignments, auth, enrollments, programs, stats, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        programs::list_programs_handler,
        programs::create_program_handler,
        programs::get_program_handler,
        programs::update_program_handler,
        programs::delete_program_handler,
        assignments::assign_employee_handler,
        assignments::assign_all_handler,
        assignments::remove_assignment_handler,
        assignments::remove_all_handler,
        enrollments::enroll_handler,
        enrollments::unenroll_handler,
        enrollments::complete_all_handler,
        enrollments::mark_complete_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::users_by_role_handler,
        users::get_user_handler,
        users::update_user_handler,
        users::delete_user_handler,
        stats::admin_dashboard_handler,
        stats::employee_dashboard_handler,
        stats::upcoming_sessions_handler,
        stats::session_stats_handler,
        stats::program_stats_handler,
        stats::completion_rate_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            programs::SessionRequest,
            programs::CreateProgramRequest,
            programs::UpdateProgramRequest,
            assignments::AssignRequest,
            enrollments::NotesRequest,
            enrollments::MarkCompleteRequest,
            users::CreateUserRequest,
            users::UpdateUserRequest,
        )
    ),
    tags(
        (name = "Training Den API", description = "Training programs, sessions, assignments and enrollments."),
        (name = "auth", description = "Cookie-session signup, login and logout."),
        (name = "programs", description = "Training programs and their sessions."),
        (name = "assignments", description = "Manager-owned program assignments."),
        (name = "enrollments", description = "Session enrollments and completion."),
        (name = "users", description = "User directory and administration."),
        (name = "stats", description = "Dashboards and counts.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
}

/// Liveness probe; does not touch the database.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
