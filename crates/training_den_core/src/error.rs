//! crates/training_den_core/src/error.rs
//!
//! The error taxonomy shared by every policy and aggregation service.

use crate::ports::PortError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// No valid session, or the session's profile row is missing.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role, ownership or account state forbids the call.
    #[error("{0}")]
    Forbidden(String),

    /// The resource is absent, or inactive and therefore invisible.
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid input, or an invalid state transition.
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected persistence failure, carrying the underlying message.
    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest(message.into())
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(_) => "Unauthorized",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::NotFound(_) => "Not Found",
            ServiceError::BadRequest(_) => "Bad Request",
            ServiceError::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::BadRequest(msg),
            PortError::Unauthorized => ServiceError::Unauthorized(
                "You must be logged in to access this resource.".to_string(),
            ),
            PortError::Unexpected(msg) => ServiceError::Internal(msg),
        }
    }
}

/// Maps a port `NotFound` to `None` so callers can decide how absence is reported.
pub(crate) fn optional<T>(result: Result<T, PortError>) -> Result<Option<T>, PortError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PortError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
