//! crates/training_den_core/src/ports.rs
//!
//! Defines the service contract for the persistence and identity gateway.
//! The trait forms the boundary of the hexagonal architecture: the policy and
//! aggregation services only ever talk to storage through `DatabaseService`,
//! so the PostgreSQL adapter and the in-memory store are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AssignmentFilter, EnrollmentFilter, NewAssignment, NewEnrollment, NewProgram, NewSession,
    NewUser, ProgramAssignment, ProgramChanges, ProgramFilter, RemovedAssignments, Role,
    SessionEnrollment, SessionFilter, TrainingProgram, TrainingSession, User, UserChanges,
    UserCredentials, UserFilter,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Identity ---

    /// Creates the credentials and the profile row together.
    async fn create_user_with_credentials(
        &self,
        new_user: NewUser,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the user id behind an unexpired auth session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Users ---
    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn list_users(&self, filter: &UserFilter) -> PortResult<Vec<User>>;

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> PortResult<User>;

    async fn count_active_users_by_role(&self, role: Role) -> PortResult<u64>;

    // --- Programs ---
    async fn get_program(&self, program_id: Uuid) -> PortResult<TrainingProgram>;

    async fn list_programs(&self, filter: &ProgramFilter) -> PortResult<Vec<TrainingProgram>>;

    async fn count_active_programs(&self, manager_id: Option<Uuid>) -> PortResult<u64>;

    /// Inserts a program and its initial sessions atomically.
    async fn create_program(
        &self,
        program: NewProgram,
        sessions: Vec<NewSession>,
    ) -> PortResult<(TrainingProgram, Vec<TrainingSession>)>;

    /// Applies `changes` and, when `sessions` is given, replaces every session of
    /// the program (and their enrollments) atomically.
    async fn update_program(
        &self,
        program_id: Uuid,
        changes: ProgramChanges,
        sessions: Option<Vec<NewSession>>,
    ) -> PortResult<(TrainingProgram, Vec<TrainingSession>)>;

    // --- Sessions ---
    async fn get_session(&self, session_id: Uuid) -> PortResult<TrainingSession>;

    /// Sessions matching `filter`, ordered by `session_datetime` ascending.
    async fn list_sessions(&self, filter: &SessionFilter) -> PortResult<Vec<TrainingSession>>;

    async fn count_active_sessions(&self, trainer_id: Option<Uuid>) -> PortResult<u64>;

    // --- Assignments ---
    async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> PortResult<Vec<ProgramAssignment>>;

    async fn find_assignment(
        &self,
        program_id: Uuid,
        employee_id: Uuid,
    ) -> PortResult<Option<ProgramAssignment>>;

    /// Inserts all assignments or none; a duplicate (program, employee) pair is a `Conflict`.
    async fn create_assignments(
        &self,
        assignments: Vec<NewAssignment>,
    ) -> PortResult<Vec<ProgramAssignment>>;

    /// Deletes the program's assignments for `employee_ids` (all when `None`),
    /// first deleting those employees' enrollments in every session of the program.
    async fn remove_assignments(
        &self,
        program_id: Uuid,
        employee_ids: Option<Vec<Uuid>>,
    ) -> PortResult<RemovedAssignments>;

    // --- Enrollments ---
    async fn get_enrollment(&self, enrollment_id: Uuid) -> PortResult<SessionEnrollment>;

    async fn find_enrollment(
        &self,
        session_id: Uuid,
        employee_id: Uuid,
    ) -> PortResult<Option<SessionEnrollment>>;

    async fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
    ) -> PortResult<Vec<SessionEnrollment>>;

    /// Inserts an incomplete enrollment; a duplicate (session, employee) pair is a `Conflict`.
    async fn create_enrollment(&self, enrollment: NewEnrollment) -> PortResult<SessionEnrollment>;

    async fn delete_enrollment(&self, enrollment_id: Uuid) -> PortResult<()>;

    /// Sets `completed = true`, `completion_date` and `notes` on every listed enrollment.
    async fn complete_enrollments(
        &self,
        enrollment_ids: &[Uuid],
        completion_date: DateTime<Utc>,
        notes: Option<String>,
    ) -> PortResult<Vec<SessionEnrollment>>;
}
