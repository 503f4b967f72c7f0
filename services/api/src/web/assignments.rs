//! services/api/src/web/assignments.rs
//!
//! Manager endpoints for assigning employees to the programs they own.

use axum::{extract::State, response::IntoResponse, Extension};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use training_den_core::assignments::{self, AssignEmployee};
use training_den_core::User;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::response::{ok, optional_body, ApiPath, Envelope};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AssignRequest {
    #[serde(rename = "employeeId")]
    pub employee_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/programs/{programId}/assign",
    params(("programId" = Uuid, Path, description = "Program id")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Employee assigned"),
        (status = 400, description = "Missing employee, wrong role, inactive or already assigned"),
        (status = 403, description = "Caller is not the owning manager"),
        (status = 404, description = "Program or employee not found")
    ),
    tag = "assignments"
)]
pub async fn assign_employee_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(program_id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: AssignRequest = optional_body(&body)?;
    let created = assignments::assign_employee(
        state.db.as_ref(),
        &user,
        program_id,
        AssignEmployee {
            employee_id: req.employee_id,
            notes: req.notes,
        },
    )
    .await?;
    Ok(ok(created))
}

/// Assign every active, not yet assigned employee.
#[utoipa::path(
    post,
    path = "/api/programs/{programId}/assign-all",
    params(("programId" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Number of employees assigned"),
        (status = 403, description = "Caller is not the owning manager"),
        (status = 404, description = "Program not found")
    ),
    tag = "assignments"
)]
pub async fn assign_all_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = assignments::assign_all(state.db.as_ref(), &user, program_id).await?;
    Ok(ok(result))
}

/// Remove one assignment and the employee's enrollments in the program.
#[utoipa::path(
    delete,
    path = "/api/programs/{programId}/assign/{employeeId}",
    params(
        ("programId" = Uuid, Path, description = "Program id"),
        ("employeeId" = Uuid, Path, description = "Employee id")
    ),
    responses(
        (status = 200, description = "Employee removed from program"),
        (status = 403, description = "Caller is not the owning manager"),
        (status = 404, description = "Program or assignment not found")
    ),
    tag = "assignments"
)]
pub async fn remove_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath((program_id, employee_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let result =
        assignments::remove_assignment(state.db.as_ref(), &user, program_id, employee_id).await?;
    Ok(Envelope::data(result).with_message("Employee removed from program"))
}

/// Remove every assignment of the program.
#[utoipa::path(
    delete,
    path = "/api/programs/{programId}/assign",
    params(("programId" = Uuid, Path, description = "Program id")),
    responses(
        (status = 200, description = "Assignments and their enrollments removed"),
        (status = 403, description = "Caller is not the owning manager"),
        (status = 404, description = "Program not found")
    ),
    tag = "assignments"
)]
pub async fn remove_all_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ApiPath(program_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = assignments::remove_all(state.db.as_ref(), &user, program_id).await?;
    Ok(ok(result))
}
