//! services/api/src/web/stats.rs
//!
//! Dashboard and count endpoints.

use axum::{extract::State, response::IntoResponse, Extension};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use training_den_core::stats::{self, UPCOMING_LIMIT};
use training_den_core::User;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::response::{ok, ApiQuery};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionStatsQuery {
    #[serde(rename = "trainerId")]
    #[param(rename = "trainerId")]
    pub trainer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgramStatsQuery {
    #[serde(rename = "managerId")]
    #[param(rename = "managerId")]
    pub manager_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/admin/dashboard-stats",
    responses(
        (status = 200, description = "Active user counts per role, active sessions and programs"),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "stats"
)]
pub async fn admin_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = stats::admin_dashboard(state.db.as_ref(), &user).await?;
    Ok(ok(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/employee/dashboard-stats",
    responses(
        (status = 200, description = "Enrolled, overdue, completed and available counts"),
        (status = 403, description = "Caller is not an employee")
    ),
    tag = "stats"
)]
pub async fn employee_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = stats::employee_dashboard_stats(state.db.as_ref(), &user, Utc::now()).await?;
    Ok(ok(dashboard))
}

/// The caller's next five incomplete enrolled sessions.
#[utoipa::path(
    get,
    path = "/api/employee/upcoming-sessions",
    responses(
        (status = 200, description = "Upcoming sessions ordered by start time"),
        (status = 403, description = "Caller is not an employee")
    ),
    tag = "stats"
)]
pub async fn upcoming_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions =
        stats::upcoming_enrolled_sessions(state.db.as_ref(), &user, Utc::now(), UPCOMING_LIMIT)
            .await?;
    Ok(ok(sessions))
}

#[utoipa::path(
    get,
    path = "/api/stats/sessions",
    params(SessionStatsQuery),
    responses(
        (status = 200, description = "Active session count"),
        (status = 403, description = "Role not allowed, or scoped to another trainer")
    ),
    tag = "stats"
)]
pub async fn session_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<SessionStatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = stats::scoped_session_count(state.db.as_ref(), &user, query.trainer_id).await?;
    Ok(ok(count))
}

#[utoipa::path(
    get,
    path = "/api/stats/programs",
    params(ProgramStatsQuery),
    responses(
        (status = 200, description = "Active program count"),
        (status = 403, description = "Role not allowed, or scoped to another manager")
    ),
    tag = "stats"
)]
pub async fn program_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<ProgramStatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = stats::scoped_program_count(state.db.as_ref(), &user, query.manager_id).await?;
    Ok(ok(count))
}

#[utoipa::path(
    get,
    path = "/api/stats/completion-rates",
    responses(
        (status = 200, description = "Total, completed and rate over all enrollments"),
        (status = 403, description = "Role not allowed")
    ),
    tag = "stats"
)]
pub async fn completion_rate_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let rate = stats::scoped_completion_rate(state.db.as_ref(), &user).await?;
    Ok(ok(rate))
}
