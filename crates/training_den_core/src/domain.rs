//! crates/training_den_core/src/domain.rs
//!
//! Defines the core data structures for Training Den: users, training
//! programs, their sessions, program assignments and session enrollments,
//! together with the write and filter inputs accepted by the persistence port.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Roles
//=========================================================================================

/// The four roles a Training Den user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Trainer,
    Employee,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Trainer, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Trainer => "trainer",
            Role::Employee => "employee",
        }
    }

    /// Position of the role in user listings (admins first, employees last).
    pub fn display_order(&self) -> u8 {
        match self {
            Role::Admin => 0,
            Role::Manager => 1,
            Role::Trainer => 2,
            Role::Employee => 3,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role: {0}")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "trainer" => Ok(Role::Trainer),
            "employee" => Ok(Role::Employee),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

//=========================================================================================
// Entities
//=========================================================================================

/// A user profile row. `role` and `is_active` drive every authorization
/// decision and are always re-read from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .flat_map(char::to_uppercase)
            .collect()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// A compliance-training initiative owned by a manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingProgram {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub manager_id: Uuid,
    pub deadline: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A scheduled instance of training within a program, led by one trainer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSession {
    pub id: Uuid,
    pub program_id: Uuid,
    pub trainer_id: Uuid,
    pub session_datetime: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grants an employee eligibility to enroll in a program's sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramAssignment {
    pub id: Uuid,
    pub program_id: Uuid,
    pub employee_id: Uuid,
    pub assigned_by_manager_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An employee's registration for a single session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEnrollment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub employee_id: Uuid,
    pub completed: bool,
    pub completion_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Write Inputs
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

/// Partial update of a user row; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProgram {
    pub title: String,
    pub notes: Option<String>,
    pub manager_id: Uuid,
    pub deadline: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramChanges {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub manager_id: Option<Uuid>,
    pub deadline: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub trainer_id: Uuid,
    pub session_datetime: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub program_id: Uuid,
    pub employee_id: Uuid,
    pub assigned_by_manager_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub session_id: Uuid,
    pub employee_id: Uuid,
    pub notes: Option<String>,
}

/// Row counts deleted by an assignment removal, including cascaded enrollments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedAssignments {
    pub assignments: u64,
    pub enrollments: u64,
}

//=========================================================================================
// Filters
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    /// Case-insensitive substring matched against first name, last name and email.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramFilter {
    pub manager_id: Option<Uuid>,
    pub ids: Option<Vec<Uuid>>,
    pub deadline_from: Option<NaiveDate>,
    pub deadline_to: Option<NaiveDate>,
    pub active_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub ids: Option<Vec<Uuid>>,
    pub program_ids: Option<Vec<Uuid>>,
    pub trainer_id: Option<Uuid>,
    pub active_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub program_ids: Option<Vec<Uuid>>,
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub session_ids: Option<Vec<Uuid>>,
    pub employee_id: Option<Uuid>,
}

//=========================================================================================
// Date Parsing
//=========================================================================================

/// Parses an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM[:SS]` one read as UTC.
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format!("invalid datetime '{}': {}", raw, e))
}

/// Parses a `YYYY-MM-DD` date; a full timestamp is cut down to its UTC date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| parse_datetime(raw).map(|dt| dt.date_naive()))
        .map_err(|_| format!("invalid date '{}'", raw))
}
