//! crates/training_den_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Every table is
//! held behind one `RwLock`, so each multi-row operation (program creation,
//! session replacement, cascade deletes) runs under a single write guard and
//! is atomic with respect to other callers. Backs the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AssignmentFilter, EnrollmentFilter, NewAssignment, NewEnrollment, NewProgram, NewSession,
    NewUser, ProgramAssignment, ProgramChanges, ProgramFilter, RemovedAssignments, Role,
    SessionEnrollment, SessionFilter, TrainingProgram, TrainingSession, User, UserChanges,
    UserCredentials, UserFilter,
};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    credentials: Vec<UserCredentials>,
    auth_sessions: Vec<(String, Uuid, DateTime<Utc>)>,
    programs: Vec<TrainingProgram>,
    sessions: Vec<TrainingSession>,
    assignments: Vec<ProgramAssignment>,
    enrollments: Vec<SessionEnrollment>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains(ids: &Option<Vec<Uuid>>, id: &Uuid) -> bool {
    ids.as_ref().map_or(true, |ids| ids.contains(id))
}

fn user_matches(filter: &UserFilter, user: &User) -> bool {
    if filter.role.is_some_and(|role| role != user.role) {
        return false;
    }
    if filter.is_active.is_some_and(|active| active != user.is_active) {
        return false;
    }
    match filter.search.as_deref().map(str::to_lowercase) {
        Some(needle) if !needle.is_empty() => [&user.first_name, &user.last_name, &user.email]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle)),
        _ => true,
    }
}

fn program_matches(filter: &ProgramFilter, program: &TrainingProgram) -> bool {
    (!filter.active_only || program.is_active)
        && filter.manager_id.map_or(true, |m| m == program.manager_id)
        && contains(&filter.ids, &program.id)
        && filter.deadline_from.map_or(true, |from| program.deadline >= from)
        && filter.deadline_to.map_or(true, |to| program.deadline <= to)
}

fn session_matches(filter: &SessionFilter, session: &TrainingSession) -> bool {
    (!filter.active_only || session.is_active)
        && filter.trainer_id.map_or(true, |t| t == session.trainer_id)
        && contains(&filter.ids, &session.id)
        && contains(&filter.program_ids, &session.program_id)
}

impl Tables {
    fn insert_sessions(
        &mut self,
        program_id: Uuid,
        sessions: Vec<NewSession>,
        now: DateTime<Utc>,
    ) -> Vec<TrainingSession> {
        let inserted: Vec<TrainingSession> = sessions
            .into_iter()
            .map(|s| TrainingSession {
                id: Uuid::new_v4(),
                program_id,
                trainer_id: s.trainer_id,
                session_datetime: s.session_datetime,
                duration_minutes: s.duration_minutes,
                notes: s.notes,
                is_active: s.is_active,
                created_at: now,
                updated_at: now,
            })
            .collect();
        self.sessions.extend(inserted.iter().cloned());
        inserted
    }

    fn program_sessions(&self, program_id: Uuid) -> Vec<TrainingSession> {
        let mut sessions: Vec<TrainingSession> = self
            .sessions
            .iter()
            .filter(|s| s.program_id == program_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.session_datetime);
        sessions
    }
}

#[async_trait]
impl DatabaseService for InMemoryStore {
    async fn create_user_with_credentials(
        &self,
        new_user: NewUser,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        let email = new_user.email.to_lowercase();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!(
                "A user with email {} already exists",
                email
            )));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role: new_user.role,
            phone: new_user.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.credentials.push(UserCredentials {
            user_id: user.id,
            email,
            hashed_password: hashed_password.to_string(),
        });
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let email = email.to_lowercase();
        self.tables
            .read()
            .await
            .credentials
            .iter()
            .find(|c| c.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables
            .write()
            .await
            .auth_sessions
            .push((session_id.to_string(), user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let now = Utc::now();
        self.tables
            .read()
            .await
            .auth_sessions
            .iter()
            .find(|(id, _, expires_at)| id == session_id && *expires_at > now)
            .map(|(_, user_id, _)| *user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables
            .write()
            .await
            .auth_sessions
            .retain(|(id, _, _)| id != session_id);
        Ok(())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.tables
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn list_users(&self, filter: &UserFilter) -> PortResult<Vec<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .filter(|u| user_matches(filter, u))
            .cloned()
            .collect())
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> PortResult<User> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        if let Some(email) = changes.email.as_deref().map(str::to_lowercase) {
            if tables.users.iter().any(|u| u.email == email && u.id != user_id) {
                return Err(PortError::Conflict(format!(
                    "A user with email {} already exists",
                    email
                )));
            }
        }
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        if let Some(email) = changes.email {
            user.email = email.to_lowercase();
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        let updated = user.clone();

        if let Some(creds) = tables.credentials.iter_mut().find(|c| c.user_id == user_id) {
            creds.email = updated.email.clone();
            if let Some(hash) = changes.password_hash {
                creds.hashed_password = hash;
            }
        }
        Ok(updated)
    }

    async fn count_active_users_by_role(&self, role: Role) -> PortResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.role == role && u.is_active)
            .count() as u64)
    }

    async fn get_program(&self, program_id: Uuid) -> PortResult<TrainingProgram> {
        self.tables
            .read()
            .await
            .programs
            .iter()
            .find(|p| p.id == program_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Program {} not found", program_id)))
    }

    async fn list_programs(&self, filter: &ProgramFilter) -> PortResult<Vec<TrainingProgram>> {
        let mut programs: Vec<TrainingProgram> = self
            .tables
            .read()
            .await
            .programs
            .iter()
            .filter(|p| program_matches(filter, p))
            .cloned()
            .collect();
        programs.sort_by_key(|p| p.deadline);
        Ok(programs)
    }

    async fn count_active_programs(&self, manager_id: Option<Uuid>) -> PortResult<u64> {
        let filter = ProgramFilter {
            manager_id,
            active_only: true,
            ..Default::default()
        };
        let tables = self.tables.read().await;
        Ok(tables
            .programs
            .iter()
            .filter(|p| program_matches(&filter, p))
            .count() as u64)
    }

    async fn create_program(
        &self,
        program: NewProgram,
        sessions: Vec<NewSession>,
    ) -> PortResult<(TrainingProgram, Vec<TrainingSession>)> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let created = TrainingProgram {
            id: Uuid::new_v4(),
            title: program.title,
            notes: program.notes,
            manager_id: program.manager_id,
            deadline: program.deadline,
            is_active: program.is_active,
            created_at: now,
            updated_at: now,
        };
        tables.programs.push(created.clone());
        let sessions = tables.insert_sessions(created.id, sessions, now);
        Ok((created, sessions))
    }

    async fn update_program(
        &self,
        program_id: Uuid,
        changes: ProgramChanges,
        sessions: Option<Vec<NewSession>>,
    ) -> PortResult<(TrainingProgram, Vec<TrainingSession>)> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let now = Utc::now();
        let program = tables
            .programs
            .iter_mut()
            .find(|p| p.id == program_id)
            .ok_or_else(|| PortError::NotFound(format!("Program {} not found", program_id)))?;
        if let Some(title) = changes.title {
            program.title = title;
        }
        if let Some(notes) = changes.notes {
            program.notes = Some(notes);
        }
        if let Some(manager_id) = changes.manager_id {
            program.manager_id = manager_id;
        }
        if let Some(deadline) = changes.deadline {
            program.deadline = deadline;
        }
        if let Some(is_active) = changes.is_active {
            program.is_active = is_active;
        }
        program.updated_at = now;
        let updated = program.clone();

        if let Some(replacement) = sessions {
            let old: HashSet<Uuid> = tables
                .sessions
                .iter()
                .filter(|s| s.program_id == program_id)
                .map(|s| s.id)
                .collect();
            tables.enrollments.retain(|e| !old.contains(&e.session_id));
            tables.sessions.retain(|s| s.program_id != program_id);
            tables.insert_sessions(program_id, replacement, now);
        }
        let sessions = tables.program_sessions(program_id);
        Ok((updated, sessions))
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<TrainingSession> {
        self.tables
            .read()
            .await
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> PortResult<Vec<TrainingSession>> {
        let mut sessions: Vec<TrainingSession> = self
            .tables
            .read()
            .await
            .sessions
            .iter()
            .filter(|s| session_matches(filter, s))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.session_datetime);
        Ok(sessions)
    }

    async fn count_active_sessions(&self, trainer_id: Option<Uuid>) -> PortResult<u64> {
        let filter = SessionFilter {
            trainer_id,
            active_only: true,
            ..Default::default()
        };
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .filter(|s| session_matches(&filter, s))
            .count() as u64)
    }

    async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> PortResult<Vec<ProgramAssignment>> {
        Ok(self
            .tables
            .read()
            .await
            .assignments
            .iter()
            .filter(|a| contains(&filter.program_ids, &a.program_id))
            .filter(|a| filter.employee_id.map_or(true, |e| e == a.employee_id))
            .cloned()
            .collect())
    }

    async fn find_assignment(
        &self,
        program_id: Uuid,
        employee_id: Uuid,
    ) -> PortResult<Option<ProgramAssignment>> {
        Ok(self
            .tables
            .read()
            .await
            .assignments
            .iter()
            .find(|a| a.program_id == program_id && a.employee_id == employee_id)
            .cloned())
    }

    async fn create_assignments(
        &self,
        assignments: Vec<NewAssignment>,
    ) -> PortResult<Vec<ProgramAssignment>> {
        let mut tables = self.tables.write().await;
        let mut seen: HashSet<(Uuid, Uuid)> = tables
            .assignments
            .iter()
            .map(|a| (a.program_id, a.employee_id))
            .collect();
        for new in &assignments {
            if !seen.insert((new.program_id, new.employee_id)) {
                return Err(PortError::Conflict(
                    "Employee is already assigned to this program".to_string(),
                ));
            }
        }
        let now = Utc::now();
        let created: Vec<ProgramAssignment> = assignments
            .into_iter()
            .map(|a| ProgramAssignment {
                id: Uuid::new_v4(),
                program_id: a.program_id,
                employee_id: a.employee_id,
                assigned_by_manager_id: a.assigned_by_manager_id,
                notes: a.notes,
                created_at: now,
            })
            .collect();
        tables.assignments.extend(created.iter().cloned());
        Ok(created)
    }

    async fn remove_assignments(
        &self,
        program_id: Uuid,
        employee_ids: Option<Vec<Uuid>>,
    ) -> PortResult<RemovedAssignments> {
        let mut tables = self.tables.write().await;
        let targets: HashSet<Uuid> = tables
            .assignments
            .iter()
            .filter(|a| a.program_id == program_id && contains(&employee_ids, &a.employee_id))
            .map(|a| a.employee_id)
            .collect();
        let program_sessions: HashSet<Uuid> = tables
            .sessions
            .iter()
            .filter(|s| s.program_id == program_id)
            .map(|s| s.id)
            .collect();

        let enrollments_before = tables.enrollments.len();
        tables.enrollments.retain(|e| {
            !(program_sessions.contains(&e.session_id) && targets.contains(&e.employee_id))
        });
        let enrollments = (enrollments_before - tables.enrollments.len()) as u64;

        let assignments_before = tables.assignments.len();
        tables
            .assignments
            .retain(|a| !(a.program_id == program_id && targets.contains(&a.employee_id)));
        let assignments = (assignments_before - tables.assignments.len()) as u64;

        Ok(RemovedAssignments {
            assignments,
            enrollments,
        })
    }

    async fn get_enrollment(&self, enrollment_id: Uuid) -> PortResult<SessionEnrollment> {
        self.tables
            .read()
            .await
            .enrollments
            .iter()
            .find(|e| e.id == enrollment_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Enrollment {} not found", enrollment_id)))
    }

    async fn find_enrollment(
        &self,
        session_id: Uuid,
        employee_id: Uuid,
    ) -> PortResult<Option<SessionEnrollment>> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .iter()
            .find(|e| e.session_id == session_id && e.employee_id == employee_id)
            .cloned())
    }

    async fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
    ) -> PortResult<Vec<SessionEnrollment>> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .iter()
            .filter(|e| contains(&filter.session_ids, &e.session_id))
            .filter(|e| filter.employee_id.map_or(true, |id| id == e.employee_id))
            .cloned()
            .collect())
    }

    async fn create_enrollment(&self, enrollment: NewEnrollment) -> PortResult<SessionEnrollment> {
        let mut tables = self.tables.write().await;
        if tables
            .enrollments
            .iter()
            .any(|e| e.session_id == enrollment.session_id && e.employee_id == enrollment.employee_id)
        {
            return Err(PortError::Conflict(
                "You are already enrolled in this session".to_string(),
            ));
        }
        let created = SessionEnrollment {
            id: Uuid::new_v4(),
            session_id: enrollment.session_id,
            employee_id: enrollment.employee_id,
            completed: false,
            completion_date: None,
            notes: enrollment.notes,
            created_at: Utc::now(),
        };
        tables.enrollments.push(created.clone());
        Ok(created)
    }

    async fn delete_enrollment(&self, enrollment_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.enrollments.len();
        tables.enrollments.retain(|e| e.id != enrollment_id);
        if tables.enrollments.len() == before {
            return Err(PortError::NotFound(format!(
                "Enrollment {} not found",
                enrollment_id
            )));
        }
        Ok(())
    }

    async fn complete_enrollments(
        &self,
        enrollment_ids: &[Uuid],
        completion_date: DateTime<Utc>,
        notes: Option<String>,
    ) -> PortResult<Vec<SessionEnrollment>> {
        let mut tables = self.tables.write().await;
        let updated = tables
            .enrollments
            .iter_mut()
            .filter(|e| enrollment_ids.contains(&e.id))
            .map(|e| {
                e.completed = true;
                e.completion_date = Some(completion_date);
                e.notes = notes.clone();
                e.clone()
            })
            .collect();
        Ok(updated)
    }
}
