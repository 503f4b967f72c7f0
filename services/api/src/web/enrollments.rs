//! services/api/src/web/enrollments.rs
//!
//! Employee self-enrollment and trainer completion endpoints.

use axum::{extract::State, response::IntoResponse, Extension};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use training_den_core::enrollments::{self, MarkComplete};
use training_den_core::User;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::response::{ok, optional_body, ApiJson, ApiPath, Envelope};
use crate::web::state::AppState;

/// Optional body of the enroll and complete-all calls.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkCompleteRequest {
    /// Must be `true`; completion cannot be undone.
    pub completed: Option<bool>,
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/sessions/{sessionId}/enroll",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    request_body = NotesRequest,
    responses(
        (status = 200, description = "The new enrollment"),
        (status = 400, description = "Session inactive or already enrolled"),
        (status = 403, description = "Caller is not an employee assigned to the program"),
        (status = 404, description = "Session not found")
    ),
    tag = "enrollments"
)]
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(session_id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: NotesRequest = optional_body(&body)?;
    let enrollment = enrollments::enroll(state.db.as_ref(), &user, session_id, req.notes).await?;
    Ok(ok(enrollment))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{sessionId}/enroll",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Successfully unenrolled from session"),
        (status = 400, description = "Enrollment already completed"),
        (status = 404, description = "Enrollment not found")
    ),
    tag = "enrollments"
)]
pub async fn unenroll_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    enrollments::unenroll(state.db.as_ref(), &user, session_id).await?;
    Ok(Envelope::message("Successfully unenrolled from session"))
}

/// Mark every incomplete enrollment of a session complete.
#[utoipa::path(
    post,
    path = "/api/sessions/{sessionId}/complete-all",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    request_body = NotesRequest,
    responses(
        (status = 200, description = "Counts of updated and already completed enrollments"),
        (status = 403, description = "Caller is not the session's trainer"),
        (status = 404, description = "Session not found")
    ),
    tag = "enrollments"
)]
pub async fn complete_all_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(session_id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: NotesRequest = optional_body(&body)?;
    let result =
        enrollments::complete_all(state.db.as_ref(), &user, session_id, req.notes, Utc::now())
            .await?;
    Ok(ok(result))
}

#[utoipa::path(
    patch,
    path = "/api/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    request_body = MarkCompleteRequest,
    responses(
        (status = 200, description = "The completed enrollment"),
        (status = 400, description = "Attempt to mark incomplete"),
        (status = 403, description = "Caller is not the session's trainer"),
        (status = 404, description = "Enrollment not found")
    ),
    tag = "enrollments"
)]
pub async fn mark_complete_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(enrollment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<MarkCompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let enrollment = enrollments::mark_complete(
        state.db.as_ref(),
        &user,
        enrollment_id,
        MarkComplete {
            completed: req.completed,
            notes: req.notes,
        },
        Utc::now(),
    )
    .await?;
    Ok(ok(enrollment))
}
