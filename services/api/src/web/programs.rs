//! services/api/src/web/programs.rs
//!
//! Training program endpoints: role-shaped listing and detail reads, and the
//! admin-only create, update and deactivate writes.

use axum::{extract::State, response::IntoResponse, Extension};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use training_den_core::programs::{self, CreateProgram, CreateSession, UpdateProgram};
use training_den_core::User;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::response::{created, ok, ApiJson, ApiPath, ApiQuery, Envelope};
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgramListQuery {
    /// Only programs whose deadline falls within the next 14 days.
    pub upcoming: Option<bool>,
}

/// One session of a program. Datetimes are RFC 3339, or naive and read as UTC.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionRequest {
    pub session_datetime: Option<String>,
    pub duration_minutes: Option<i32>,
    pub trainer_id: Option<Uuid>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl From<SessionRequest> for CreateSession {
    fn from(req: SessionRequest) -> Self {
        Self {
            session_datetime: req.session_datetime,
            duration_minutes: req.duration_minutes,
            trainer_id: req.trainer_id,
            notes: req.notes,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProgramRequest {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub manager_id: Option<Uuid>,
    /// `YYYY-MM-DD`.
    pub deadline: Option<String>,
    pub is_active: Option<bool>,
    pub sessions: Option<Vec<SessionRequest>>,
}

impl From<CreateProgramRequest> for CreateProgram {
    fn from(req: CreateProgramRequest) -> Self {
        Self {
            title: req.title,
            notes: req.notes,
            manager_id: req.manager_id,
            deadline: req.deadline,
            is_active: req.is_active,
            sessions: req
                .sessions
                .map(|s| s.into_iter().map(CreateSession::from).collect()),
        }
    }
}

/// Partial update. A present `sessions` list replaces every existing session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProgramRequest {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub manager_id: Option<Uuid>,
    pub deadline: Option<String>,
    pub is_active: Option<bool>,
    pub sessions: Option<Vec<SessionRequest>>,
}

impl From<UpdateProgramRequest> for UpdateProgram {
    fn from(req: UpdateProgramRequest) -> Self {
        Self {
            title: req.title,
            notes: req.notes,
            manager_id: req.manager_id,
            deadline: req.deadline,
            is_active: req.is_active,
            sessions: req
                .sessions
                .map(|s| s.into_iter().map(CreateSession::from).collect()),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List active training programs visible to the caller.
#[utoipa::path(
    get,
    path = "/api/training-programs",
    params(ProgramListQuery),
    responses(
        (status = 200, description = "Program cards ordered by deadline"),
        (status = 401, description = "Not logged in")
    ),
    tag = "programs"
)]
pub async fn list_programs_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<ProgramListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = programs::training_program_cards(
        state.db.as_ref(),
        &user,
        query.upcoming.unwrap_or(false),
        Utc::now(),
    )
    .await?;
    Ok(ok(cards))
}

/// Create a program together with its sessions.
#[utoipa::path(
    post,
    path = "/api/training-programs",
    request_body = CreateProgramRequest,
    responses(
        (status = 201, description = "Training program created successfully"),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "programs"
)]
pub async fn create_program_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiJson(req): ApiJson<CreateProgramRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = programs::create_program(state.db.as_ref(), &user, req.into()).await?;
    Ok(created(result, "Training program created successfully"))
}

/// Program detail shaped for the caller's role.
#[utoipa::path(
    get,
    path = "/api/training-programs/{id}",
    params(("id" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Role-specific program detail, tagged by `view`"),
        (status = 403, description = "You do not have permission to access this program."),
        (status = 404, description = "Training program not found or inactive.")
    ),
    tag = "programs"
)]
pub async fn get_program_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = programs::program_detail(state.db.as_ref(), &user, program_id, Utc::now()).await?;
    Ok(ok(detail))
}

#[utoipa::path(
    patch,
    path = "/api/training-programs/{id}",
    params(("id" = Uuid, Path, description = "Program id")),
    request_body = UpdateProgramRequest,
    responses(
        (status = 200, description = "Training program updated successfully"),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Program not found")
    ),
    tag = "programs"
)]
pub async fn update_program_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(program_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProgramRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result =
        programs::update_program(state.db.as_ref(), &user, program_id, req.into()).await?;
    Ok(Envelope::data(result).with_message("Training program updated successfully"))
}

/// Soft-delete a program.
#[utoipa::path(
    delete,
    path = "/api/training-programs/{id}",
    params(("id" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Training program deactivated successfully"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Program not found")
    ),
    tag = "programs"
)]
pub async fn delete_program_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = programs::deactivate_program(state.db.as_ref(), &user, program_id).await?;
    Ok(Envelope::data(result).with_message("Training program deactivated successfully"))
}
