//! services/api/src/web/router.rs
//!
//! Assembles the HTTP routes. The binary adds CORS and Swagger UI on top; the
//! integration tests drive this router directly.

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::web::{
    assignments, auth, enrollments, middleware::require_auth, programs, rest::health_handler,
    state::AppState, stats, users,
};

pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/signup", post(auth::signup_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required; role checks run in the services)
    let protected_routes = Router::new()
        .route("/api/admin/dashboard-stats", get(stats::admin_dashboard_handler))
        .route(
            "/api/employee/dashboard-stats",
            get(stats::employee_dashboard_handler),
        )
        .route(
            "/api/employee/upcoming-sessions",
            get(stats::upcoming_sessions_handler),
        )
        .route("/api/stats/sessions", get(stats::session_stats_handler))
        .route("/api/stats/programs", get(stats::program_stats_handler))
        .route(
            "/api/stats/completion-rates",
            get(stats::completion_rate_handler),
        )
        .route(
            "/api/training-programs",
            get(programs::list_programs_handler).post(programs::create_program_handler),
        )
        .route(
            "/api/training-programs/{id}",
            get(programs::get_program_handler)
                .patch(programs::update_program_handler)
                .delete(programs::delete_program_handler),
        )
        .route(
            "/api/programs/{programId}/assign",
            post(assignments::assign_employee_handler).delete(assignments::remove_all_handler),
        )
        .route(
            "/api/programs/{programId}/assign/{employeeId}",
            delete(assignments::remove_assignment_handler),
        )
        .route(
            "/api/programs/{programId}/assign-all",
            post(assignments::assign_all_handler),
        )
        .route(
            "/api/sessions/{sessionId}/enroll",
            post(enrollments::enroll_handler).delete(enrollments::unenroll_handler),
        )
        .route(
            "/api/sessions/{sessionId}/complete-all",
            post(enrollments::complete_all_handler),
        )
        .route(
            "/api/enrollments/{id}",
            patch(enrollments::mark_complete_handler),
        )
        .route(
            "/api/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route("/api/users/by-role/{role}", get(users::users_by_role_handler))
        .route(
            "/api/users/{id}",
            get(users::get_user_handler)
                .patch(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
