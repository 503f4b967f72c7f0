//! services/api/src/web/users.rs
//!
//! The user directory: searchable listing and detail for any signed-in user,
//! account administration for admins.

use axum::{extract::State, response::IntoResponse, Extension};
use serde::Deserialize;
use std::sync::Arc;
use training_den_core::users::{self, CreateUser, UpdateUser};
use training_den_core::{Role, ServiceError, User, UserFilter};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::hash_password;
use crate::web::response::{created, ok, ApiJson, ApiPath, ApiQuery, Envelope};
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub role: Option<String>,
    /// `true` keeps active users; any other value keeps inactive ones.
    pub is_active: Option<String>,
    /// Case-insensitive match on first name, last name or email.
    pub search: Option<String>,
}

impl UserListQuery {
    fn into_filter(self) -> Result<UserFilter, ServiceError> {
        let role = match self.role.filter(|r| !r.is_empty()) {
            Some(raw) => Some(
                raw.parse::<Role>()
                    .map_err(|_| ServiceError::bad_request("Invalid role"))?,
            ),
            None => None,
        };
        Ok(UserFilter {
            role,
            is_active: self.is_active.map(|v| v == "true"),
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl From<CreateUserRequest> for CreateUser {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            phone: req.phone,
            password: req.password,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    /// Resets the password when present and non-blank.
    pub password: Option<String>,
}

impl From<UpdateUserRequest> for UpdateUser {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            phone: req.phone,
            is_active: req.is_active,
            password: req.password,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users ordered by role, last name, first name"),
        (status = 400, description = "Invalid role")
    ),
    tag = "users"
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let users = users::list_users(state.db.as_ref(), &filter).await?;
    Ok(ok(users))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully"),
        (status = 400, description = "Missing fields, invalid email or role, or email taken"),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "users"
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<User>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = users::create_user(state.db.as_ref(), &caller, req.into(), hash_password).await?;
    Ok(created(user, "User created successfully"))
}

/// Active users of one role, for pickers.
#[utoipa::path(
    get,
    path = "/api/users/by-role/{role}",
    params(("role" = String, Path, description = "admin, manager, trainer or employee")),
    responses(
        (status = 200, description = "Active users of the role ordered by last name"),
        (status = 400, description = "Invalid role")
    ),
    tag = "users"
)]
pub async fn users_by_role_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(role): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let options = users::users_by_role(state.db.as_ref(), &role).await?;
    Ok(ok(options))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "The user; admins also see role-specific activity"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = users::user_detail(state.db.as_ref(), &caller, user_id).await?;
    Ok(ok(detail))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "The updated user"),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Caller is not an admin, or is changing their own role or status"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = users::update_user(
        state.db.as_ref(),
        &caller,
        user_id,
        req.into(),
        hash_password,
    )
    .await?;
    Ok(ok(user))
}

/// Soft-delete a user.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated successfully"),
        (status = 403, description = "Caller is not an admin, or targets themselves"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<User>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = users::deactivate_user(state.db.as_ref(), &caller, user_id).await?;
    Ok(Envelope::data(result).with_message("User deactivated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_mirrors_string_flags() {
        let filter = UserListQuery {
            role: Some("trainer".into()),
            is_active: Some("nope".into()),
            search: Some("  ".into()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.role, Some(Role::Trainer));
        assert_eq!(filter.is_active, Some(false));
        assert_eq!(filter.search, None);

        let err = UserListQuery {
            role: Some("wizard".into()),
            is_active: None,
            search: None,
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err, ServiceError::BadRequest("Invalid role".into()));
    }
}
