//! crates/training_den_core/src/guard.rs
//!
//! Authorization guard. Identity comes from the session token; role and
//! active status are re-read from the user row on every call.

use tracing::debug;
use uuid::Uuid;

use crate::domain::{Role, User};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::DatabaseService;

pub const NOT_LOGGED_IN: &str = "You must be logged in to access this resource.";
pub const ACCOUNT_INACTIVE: &str = "Your account is inactive.";
pub const NO_PERMISSION: &str = "You do not have permission to access this resource.";

fn unauthenticated() -> ServiceError {
    ServiceError::Unauthorized(NOT_LOGGED_IN.to_string())
}

/// Resolves the caller behind `session_token` and returns their fresh profile.
pub async fn require_auth(
    db: &dyn DatabaseService,
    session_token: Option<&str>,
) -> ServiceResult<User> {
    // 1. Resolve identity from the session
    let token = session_token
        .filter(|t| !t.is_empty())
        .ok_or_else(unauthenticated)?;
    let user_id = db.validate_auth_session(token).await.map_err(|e| {
        debug!(error = %e, "Session validation failed");
        unauthenticated()
    })?;

    // 2. Re-read the profile row; a missing row counts as unauthenticated
    let user = db.get_user_by_id(user_id).await.map_err(|e| {
        debug!(user_id = %user_id, error = %e, "Profile lookup failed");
        unauthenticated()
    })?;

    if !user.is_active {
        return Err(ServiceError::forbidden(ACCOUNT_INACTIVE));
    }
    Ok(user)
}

/// `require_auth` followed by `ensure_role` on the fresh role. The HTTP layer
/// runs the two halves separately: the middleware authenticates once per
/// request and each service checks its own allow-list.
pub async fn require_role(
    db: &dyn DatabaseService,
    session_token: Option<&str>,
    allowed: &[Role],
) -> ServiceResult<User> {
    let user = require_auth(db, session_token).await?;
    ensure_role(&user, allowed)?;
    Ok(user)
}

pub fn ensure_role(user: &User, allowed: &[Role]) -> ServiceResult<()> {
    ensure_role_or(user, allowed, NO_PERMISSION)
}

/// Like `ensure_role`, with a caller-specific rejection message.
pub fn ensure_role_or(user: &User, allowed: &[Role], message: &str) -> ServiceResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(message))
    }
}

/// Non-admin callers may only scope a query to their own id.
pub fn ensure_self_scope(user: &User, requested: Option<Uuid>) -> ServiceResult<()> {
    match requested {
        Some(id) if !user.is_admin() && id != user.id => Err(ServiceError::forbidden(
            "You can only view your own statistics.",
        )),
        _ => Ok(()),
    }
}
