//! crates/training_den_core/src/views.rs
//!
//! JSON shapes returned by the services. Field names follow the wire contract
//! consumed by the web client, which mixes snake_case columns with camelCase
//! computed fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Role, TrainingProgram, TrainingSession, User};

//=========================================================================================
// Shared Fragments
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeInfo {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
}

impl From<&User> for EmployeeInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
        }
    }
}

/// Minimal `{id, title}` reference to a program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramRef {
    pub id: Uuid,
    pub title: String,
}

impl From<&TrainingProgram> for ProgramRef {
    fn from(program: &TrainingProgram) -> Self {
        Self {
            id: program.id,
            title: program.title.clone(),
        }
    }
}

//=========================================================================================
// Program Listing and Detail
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramCard {
    pub id: Uuid,
    pub title: String,
    pub manager_name: String,
    pub deadline: NaiveDate,
    /// Number of program assignments.
    pub enrollment_count: u64,
}

/// Program fields common to every role-specific detail shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramBase {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub manager_id: Uuid,
    #[serde(rename = "managerName")]
    pub manager_name: String,
    pub deadline: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgramBase {
    pub fn new(program: &TrainingProgram, manager_name: String) -> Self {
        Self {
            id: program.id,
            title: program.title.clone(),
            notes: program.notes.clone(),
            manager_id: program.manager_id,
            manager_name,
            deadline: program.deadline,
            is_active: program.is_active,
            created_at: program.created_at,
            updated_at: program.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramSession {
    pub id: Uuid,
    pub program_id: Uuid,
    pub trainer_id: Uuid,
    #[serde(rename = "trainerName")]
    pub trainer_name: Option<String>,
    pub session_datetime: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub is_active: bool,
}

impl ProgramSession {
    pub fn new(session: &TrainingSession, trainer_name: Option<String>) -> Self {
        Self {
            id: session.id,
            program_id: session.program_id,
            trainer_id: session.trainer_id,
            trainer_name,
            session_datetime: session.session_datetime,
            duration_minutes: session.duration_minutes,
            notes: session.notes.clone(),
            is_active: session.is_active,
        }
    }
}

/// A session as seen by a trainer, flagged when the trainer leads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainerSession {
    #[serde(flatten)]
    pub session: ProgramSession,
    #[serde(rename = "isOwner")]
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedEmployee {
    pub id: Uuid,
    pub employee: EmployeeInfo,
    pub assigned_by_manager_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentInfo {
    pub id: Uuid,
    pub employee: EmployeeInfo,
    pub session_id: Uuid,
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_enrolled: u64,
    pub completed: u64,
    pub overdue: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerStats {
    pub total_enrolled: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmployeeStats {
    pub enrolled: u64,
    pub completed: u64,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminProgramDetail {
    #[serde(flatten)]
    pub base: ProgramBase,
    pub sessions: Vec<ProgramSession>,
    #[serde(rename = "enrolledEmployees")]
    pub enrolled_employees: Vec<EnrollmentInfo>,
    pub stats: AdminStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerProgramDetail {
    #[serde(flatten)]
    pub base: ProgramBase,
    #[serde(rename = "assignedEmployees")]
    pub assigned_employees: Vec<AssignedEmployee>,
    #[serde(rename = "availableEmployees")]
    pub available_employees: Vec<EmployeeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainerProgramDetail {
    #[serde(flatten)]
    pub base: ProgramBase,
    pub sessions: Vec<TrainerSession>,
    #[serde(rename = "enrolledEmployees")]
    pub enrolled_employees: Vec<EnrollmentInfo>,
    pub stats: TrainerStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeProgramDetail {
    #[serde(flatten)]
    pub base: ProgramBase,
    pub sessions: Vec<ProgramSession>,
    #[serde(rename = "myEnrollments")]
    pub my_enrollments: Vec<EnrollmentInfo>,
    pub stats: EmployeeStats,
}

/// One detail shape per caller role. Serialized with a `view` tag naming the role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ProgramDetail {
    Admin(AdminProgramDetail),
    Manager(ManagerProgramDetail),
    Trainer(TrainerProgramDetail),
    Employee(EmployeeProgramDetail),
}

impl ProgramDetail {
    pub fn base(&self) -> &ProgramBase {
        match self {
            ProgramDetail::Admin(d) => &d.base,
            ProgramDetail::Manager(d) => &d.base,
            ProgramDetail::Trainer(d) => &d.base,
            ProgramDetail::Employee(d) => &d.base,
        }
    }
}

/// A freshly written program together with all of its sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramWithSessions {
    pub program: TrainingProgram,
    pub sessions: Vec<TrainingSession>,
}

//=========================================================================================
// Dashboards and Counts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionRate {
    pub total: u64,
    pub completed: u64,
    /// Percentage rounded to two decimals; 0 when there are no enrollments.
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboardStats {
    pub total_enrolled: u64,
    pub overdue: u64,
    pub completed: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardStats {
    pub admins: u64,
    pub employees: u64,
    pub managers: u64,
    pub trainers: u64,
    pub active_sessions: u64,
    pub active_programs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionCount {
    pub active_sessions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProgramCount {
    pub active_programs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingSession {
    pub enrollment_id: Uuid,
    pub session_id: Uuid,
    pub session_datetime: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub trainer_name: Option<String>,
    pub program_id: Uuid,
    pub program_title: String,
}

//=========================================================================================
// Mutation Results
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentCreated {
    pub id: Uuid,
    pub employee: EmployeeInfo,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignAllResult {
    pub assigned: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRemoved {
    pub employee_id: Uuid,
    pub enrollments_removed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveAllResult {
    pub removed: u64,
    pub enrollments_removed: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteAllResult {
    pub updated: u64,
    pub already_completed: u64,
    pub message: String,
}

/// Acknowledges a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deactivated {
    pub id: Uuid,
    pub is_active: bool,
}

//=========================================================================================
// User Directory
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDisplay {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub initials: String,
}

impl From<User> for UserDisplay {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            initials: user.initials(),
            user,
        }
    }
}

/// Compact entry for pickers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserOption {
    pub id: Uuid,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedProgram {
    pub id: Uuid,
    pub title: String,
    pub deadline: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedSession {
    pub id: Uuid,
    pub session_datetime: DateTime<Utc>,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub program: Option<ProgramRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedProgramRef {
    pub id: Uuid,
    pub title: String,
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedProgram {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub program: Option<AssignedProgramRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledSessionRef {
    pub id: Uuid,
    pub session_datetime: DateTime<Utc>,
    pub program: Option<ProgramRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledSession {
    pub id: Uuid,
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub session: Option<EnrolledSessionRef>,
}

/// Role-specific activity attached to a user profile for admin callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoleActivity {
    Manager {
        #[serde(rename = "managedPrograms")]
        managed_programs: Vec<ManagedProgram>,
    },
    Trainer {
        #[serde(rename = "trainingSessions")]
        training_sessions: Vec<LedSession>,
    },
    Employee {
        #[serde(rename = "assignedPrograms")]
        assigned_programs: Vec<AssignedProgram>,
        #[serde(rename = "enrolledSessions")]
        enrolled_sessions: Vec<EnrolledSession>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub activity: Option<RoleActivity>,
}
