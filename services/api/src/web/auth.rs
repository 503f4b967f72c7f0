//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use training_den_core::domain::{NewUser, Role, User};
use training_den_core::guard::ACCOUNT_INACTIVE;
use training_den_core::users::is_valid_email;
use training_den_core::{PortError, ServiceError, ServiceResult};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::session_token;
use crate::web::response::{ApiJson, Envelope};
use crate::web::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
}

impl From<&User> for AuthResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.to_string(),
            full_name: user.full_name(),
        }
    }
}

//=========================================================================================
// Password Hashing
//=========================================================================================

/// Hashes `password` with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ServiceError::Internal("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, stored_hash: &str) -> ServiceResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ServiceError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Creates the auth session row and returns the matching `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(state.config.session_ttl_days);
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;
    Ok(state.session_cookie(&auth_session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new employee account and start a session
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request or email already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate the request
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ServiceError::bad_request("Invalid email format").into());
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .into());
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ServiceError::bad_request("Missing required fields").into());
    }

    // 2. Hash the password
    let password_hash = hash_password(&req.password)?;

    // 3. Create credentials and profile together
    let user = state
        .db
        .create_user_with_credentials(
            NewUser {
                email,
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                role: Role::Employee,
                phone: req.phone.filter(|p| !p.trim().is_empty()),
            },
            &password_hash,
        )
        .await?;

    // 4. Start the session
    let cookie = start_session(&state, user.id).await?;
    info!(user_id = %user.id, "User signed up");

    // 5. Return response with cookie
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Envelope::data(AuthResponse::from(&user)),
    ))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account inactive"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Get credentials by email
    let creds = match state
        .db
        .get_credentials_by_email(&req.email.trim().to_lowercase())
        .await
    {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()).into())
        }
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    if !verify_password(&req.password, &creds.hashed_password)? {
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()).into());
    }

    // 3. Refuse deactivated accounts before issuing a session
    let user = state.db.get_user_by_id(creds.user_id).await?;
    if !user.is_active {
        return Err(ServiceError::forbidden(ACCOUNT_INACTIVE).into());
    }

    // 4. Start the session
    let cookie = start_session(&state, user.id).await?;
    info!(user_id = %user.id, "User logged in");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Envelope::data(AuthResponse::from(&user)),
    ))
}

/// POST /api/auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful")
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Delete the auth session, if the browser still holds one
    if let Some(auth_session_id) = session_token(&headers) {
        match state.db.delete_auth_session(auth_session_id).await {
            Ok(()) | Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    // 2. Clear cookie
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, state.cleared_cookie())],
        Envelope::message("Logged out"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
        assert!(verify_password("x", "not a phc string").is_err());
    }
}
