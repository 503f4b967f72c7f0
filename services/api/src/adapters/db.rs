//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every operation that touches more than one statement runs inside a single
//! transaction, so a failed step leaves no partial program, session set or
//! cascade behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use training_den_core::domain::{
    AssignmentFilter, EnrollmentFilter, NewAssignment, NewEnrollment, NewProgram, NewSession,
    NewUser, ProgramAssignment, ProgramChanges, ProgramFilter, RemovedAssignments, Role,
    SessionEnrollment, SessionFilter, TrainingProgram, TrainingSession, User, UserChanges,
    UserCredentials, UserFilter,
};
use training_den_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, phone, is_active, created_at, updated_at";
const PROGRAM_COLUMNS: &str =
    "id, title, notes, manager_id, deadline, is_active, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, program_id, trainer_id, session_datetime, duration_minutes, \
     notes, is_active, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, program_id, employee_id, assigned_by_manager_id, notes, created_at";
const ENROLLMENT_COLUMNS: &str =
    "id, session_id, employee_id, completed, completion_date, notes, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Maps `RowNotFound` to `PortError::NotFound(message)`.
fn or_not_found(message: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(message),
        other => unexpected(other),
    }
}

/// Maps a unique-constraint violation to `PortError::Conflict(message)`.
fn or_conflict(message: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| {
        if is_unique_violation(&e) {
            PortError::Conflict(message)
        } else {
            unexpected(e)
        }
    }
}

fn email_taken(email: &str) -> String {
    format!("A user with email {} already exists", email)
}

/// Escapes LIKE wildcards so a search term only ever matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(User {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role,
            phone: self.phone,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct ProgramRecord {
    id: Uuid,
    title: String,
    notes: Option<String>,
    manager_id: Uuid,
    deadline: NaiveDate,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProgramRecord {
    fn to_domain(self) -> TrainingProgram {
        TrainingProgram {
            id: self.id,
            title: self.title,
            notes: self.notes,
            manager_id: self.manager_id,
            deadline: self.deadline,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    program_id: Uuid,
    trainer_id: Uuid,
    session_datetime: DateTime<Utc>,
    duration_minutes: i32,
    notes: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> TrainingSession {
        TrainingSession {
            id: self.id,
            program_id: self.program_id,
            trainer_id: self.trainer_id,
            session_datetime: self.session_datetime,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    program_id: Uuid,
    employee_id: Uuid,
    assigned_by_manager_id: Uuid,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}
impl AssignmentRecord {
    fn to_domain(self) -> ProgramAssignment {
        ProgramAssignment {
            id: self.id,
            program_id: self.program_id,
            employee_id: self.employee_id,
            assigned_by_manager_id: self.assigned_by_manager_id,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    id: Uuid,
    session_id: Uuid,
    employee_id: Uuid,
    completed: bool,
    completion_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}
impl EnrollmentRecord {
    fn to_domain(self) -> SessionEnrollment {
        SessionEnrollment {
            id: self.id,
            session_id: self.session_id,
            employee_id: self.employee_id,
            completed: self.completed,
            completion_date: self.completion_date,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

fn sessions_to_domain(records: Vec<SessionRecord>) -> Vec<TrainingSession> {
    records.into_iter().map(SessionRecord::to_domain).collect()
}

//=========================================================================================
// Transaction Helpers
//=========================================================================================

/// Inserts `sessions` for `program_id` on an open connection or transaction.
async fn insert_sessions(
    conn: &mut PgConnection,
    program_id: Uuid,
    sessions: Vec<NewSession>,
) -> Result<Vec<SessionRecord>, sqlx::Error> {
    if sessions.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO training_session \
         (id, program_id, trainer_id, session_datetime, duration_minutes, notes, is_active) ",
    );
    qb.push_values(sessions, |mut row, s| {
        row.push_bind(Uuid::new_v4())
            .push_bind(program_id)
            .push_bind(s.trainer_id)
            .push_bind(s.session_datetime)
            .push_bind(s.duration_minutes)
            .push_bind(s.notes)
            .push_bind(s.is_active);
    });
    qb.push(" RETURNING ").push(SESSION_COLUMNS);
    qb.build_query_as::<SessionRecord>()
        .fetch_all(&mut *conn)
        .await
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Identity ---

    async fn create_user_with_credentials(
        &self,
        new_user: NewUser,
        hashed_password: &str,
    ) -> PortResult<User> {
        let email = new_user.email.to_lowercase();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, first_name, last_name, role, phone) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.role.as_str())
        .bind(&new_user.phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(or_conflict(email_taken(&email)))?;

        sqlx::query("INSERT INTO user_credentials (user_id, hashed_password) VALUES ($1, $2)")
            .bind(record.id)
            .bind(hashed_password)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let email = email.to_lowercase();
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT c.user_id, u.email, c.hashed_password \
             FROM user_credentials c JOIN users u ON u.id = c.user_id \
             WHERE u.email = $1",
        )
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(or_not_found(format!("User with email {} not found", email)))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Users ---

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(or_not_found(format!("User {} not found", user_id)))?
        .to_domain()
    }

    async fn list_users(&self, filter: &UserFilter) -> PortResult<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(USER_COLUMNS).push(" FROM users WHERE TRUE");
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(is_active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.build_query_as::<UserRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(UserRecord::to_domain)
            .collect()
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> PortResult<User> {
        let email = changes.email.map(|e| e.to_lowercase());
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
        if let Some(email) = &email {
            qb.push(", email = ").push_bind(email.clone());
        }
        if let Some(first_name) = changes.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = changes.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(role) = changes.role {
            qb.push(", role = ").push_bind(role.as_str());
        }
        if let Some(phone) = changes.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(is_active) = changes.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        qb.push(" WHERE id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        let record = qb
            .build_query_as::<UserRecord>()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
                other if is_unique_violation(&other) => {
                    PortError::Conflict(email_taken(email.as_deref().unwrap_or_default()))
                }
                other => unexpected(other),
            })?;

        if let Some(hash) = changes.password_hash {
            sqlx::query("UPDATE user_credentials SET hashed_password = $1 WHERE user_id = $2")
                .bind(hash)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn count_active_users_by_role(&self, role: Role) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE role = $1 AND is_active",
        )
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }

    // --- Programs ---

    async fn get_program(&self, program_id: Uuid) -> PortResult<TrainingProgram> {
        let record = sqlx::query_as::<_, ProgramRecord>(&format!(
            "SELECT {} FROM training_program WHERE id = $1",
            PROGRAM_COLUMNS
        ))
        .bind(program_id)
        .fetch_one(&self.pool)
        .await
        .map_err(or_not_found(format!("Program {} not found", program_id)))?;
        Ok(record.to_domain())
    }

    async fn list_programs(&self, filter: &ProgramFilter) -> PortResult<Vec<TrainingProgram>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(PROGRAM_COLUMNS).push(" FROM training_program WHERE TRUE");
        if filter.active_only {
            qb.push(" AND is_active");
        }
        if let Some(manager_id) = filter.manager_id {
            qb.push(" AND manager_id = ").push_bind(manager_id);
        }
        if let Some(ids) = &filter.ids {
            qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(from) = filter.deadline_from {
            qb.push(" AND deadline >= ").push_bind(from);
        }
        if let Some(to) = filter.deadline_to {
            qb.push(" AND deadline <= ").push_bind(to);
        }
        qb.push(" ORDER BY deadline ASC");
        let records = qb
            .build_query_as::<ProgramRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(ProgramRecord::to_domain).collect())
    }

    async fn count_active_programs(&self, manager_id: Option<Uuid>) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM training_program \
             WHERE is_active AND ($1::uuid IS NULL OR manager_id = $1)",
        )
        .bind(manager_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }

    async fn create_program(
        &self,
        program: NewProgram,
        sessions: Vec<NewSession>,
    ) -> PortResult<(TrainingProgram, Vec<TrainingSession>)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, ProgramRecord>(&format!(
            "INSERT INTO training_program (id, title, notes, manager_id, deadline, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            PROGRAM_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&program.title)
        .bind(&program.notes)
        .bind(program.manager_id)
        .bind(program.deadline)
        .bind(program.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let sessions = insert_sessions(&mut *tx, record.id, sessions)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok((record.to_domain(), sessions_to_domain(sessions)))
    }

    async fn update_program(
        &self,
        program_id: Uuid,
        changes: ProgramChanges,
        sessions: Option<Vec<NewSession>>,
    ) -> PortResult<(TrainingProgram, Vec<TrainingSession>)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // 1. Apply the scalar changes
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE training_program SET updated_at = now()");
        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(notes) = changes.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        if let Some(manager_id) = changes.manager_id {
            qb.push(", manager_id = ").push_bind(manager_id);
        }
        if let Some(deadline) = changes.deadline {
            qb.push(", deadline = ").push_bind(deadline);
        }
        if let Some(is_active) = changes.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        qb.push(" WHERE id = ")
            .push_bind(program_id)
            .push(" RETURNING ")
            .push(PROGRAM_COLUMNS);
        let record = qb
            .build_query_as::<ProgramRecord>()
            .fetch_one(&mut *tx)
            .await
            .map_err(or_not_found(format!("Program {} not found", program_id)))?;

        // 2. Replace the sessions, dropping their enrollments first
        if let Some(replacement) = sessions {
            sqlx::query(
                "DELETE FROM session_enrollment WHERE session_id IN \
                 (SELECT id FROM training_session WHERE program_id = $1)",
            )
            .bind(program_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            sqlx::query("DELETE FROM training_session WHERE program_id = $1")
                .bind(program_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
            insert_sessions(&mut *tx, program_id, replacement)
                .await
                .map_err(unexpected)?;
        }

        // 3. Read back the full session list
        let sessions = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM training_session WHERE program_id = $1 ORDER BY session_datetime ASC",
            SESSION_COLUMNS
        ))
        .bind(program_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok((record.to_domain(), sessions_to_domain(sessions)))
    }

    // --- Sessions ---

    async fn get_session(&self, session_id: Uuid) -> PortResult<TrainingSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM training_session WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(or_not_found(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> PortResult<Vec<TrainingSession>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(SESSION_COLUMNS).push(" FROM training_session WHERE TRUE");
        if filter.active_only {
            qb.push(" AND is_active");
        }
        if let Some(trainer_id) = filter.trainer_id {
            qb.push(" AND trainer_id = ").push_bind(trainer_id);
        }
        if let Some(ids) = &filter.ids {
            qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(program_ids) = &filter.program_ids {
            qb.push(" AND program_id = ANY(")
                .push_bind(program_ids.clone())
                .push(")");
        }
        qb.push(" ORDER BY session_datetime ASC");
        let records = qb
            .build_query_as::<SessionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(sessions_to_domain(records))
    }

    async fn count_active_sessions(&self, trainer_id: Option<Uuid>) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM training_session \
             WHERE is_active AND ($1::uuid IS NULL OR trainer_id = $1)",
        )
        .bind(trainer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }

    // --- Assignments ---

    async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> PortResult<Vec<ProgramAssignment>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(ASSIGNMENT_COLUMNS).push(" FROM program_assignment WHERE TRUE");
        if let Some(program_ids) = &filter.program_ids {
            qb.push(" AND program_id = ANY(")
                .push_bind(program_ids.clone())
                .push(")");
        }
        if let Some(employee_id) = filter.employee_id {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        qb.push(" ORDER BY created_at ASC");
        let records = qb
            .build_query_as::<AssignmentRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(AssignmentRecord::to_domain).collect())
    }

    async fn find_assignment(
        &self,
        program_id: Uuid,
        employee_id: Uuid,
    ) -> PortResult<Option<ProgramAssignment>> {
        let record = sqlx::query_as::<_, AssignmentRecord>(&format!(
            "SELECT {} FROM program_assignment WHERE program_id = $1 AND employee_id = $2",
            ASSIGNMENT_COLUMNS
        ))
        .bind(program_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(AssignmentRecord::to_domain))
    }

    async fn create_assignments(
        &self,
        assignments: Vec<NewAssignment>,
    ) -> PortResult<Vec<ProgramAssignment>> {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO program_assignment \
             (id, program_id, employee_id, assigned_by_manager_id, notes) ",
        );
        qb.push_values(assignments, |mut row, a| {
            row.push_bind(Uuid::new_v4())
                .push_bind(a.program_id)
                .push_bind(a.employee_id)
                .push_bind(a.assigned_by_manager_id)
                .push_bind(a.notes);
        });
        qb.push(" RETURNING ").push(ASSIGNMENT_COLUMNS);

        // A single multi-row INSERT is atomic on its own.
        let records = qb
            .build_query_as::<AssignmentRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(or_conflict(
                "Employee is already assigned to this program".to_string(),
            ))?;
        Ok(records.into_iter().map(AssignmentRecord::to_domain).collect())
    }

    async fn remove_assignments(
        &self,
        program_id: Uuid,
        employee_ids: Option<Vec<Uuid>>,
    ) -> PortResult<RemovedAssignments> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // 1. Enrollments of the targeted employees in any session of the program
        let enrollments = sqlx::query(
            "DELETE FROM session_enrollment e USING training_session s \
             WHERE e.session_id = s.id AND s.program_id = $1 \
             AND e.employee_id IN (SELECT employee_id FROM program_assignment \
                                   WHERE program_id = $1 \
                                   AND ($2::uuid[] IS NULL OR employee_id = ANY($2)))",
        )
        .bind(program_id)
        .bind(&employee_ids)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();

        // 2. The assignments themselves
        let assignments = sqlx::query(
            "DELETE FROM program_assignment \
             WHERE program_id = $1 AND ($2::uuid[] IS NULL OR employee_id = ANY($2))",
        )
        .bind(program_id)
        .bind(&employee_ids)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();

        tx.commit().await.map_err(unexpected)?;
        Ok(RemovedAssignments {
            assignments,
            enrollments,
        })
    }

    // --- Enrollments ---

    async fn get_enrollment(&self, enrollment_id: Uuid) -> PortResult<SessionEnrollment> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM session_enrollment WHERE id = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(or_not_found(format!("Enrollment {} not found", enrollment_id)))?;
        Ok(record.to_domain())
    }

    async fn find_enrollment(
        &self,
        session_id: Uuid,
        employee_id: Uuid,
    ) -> PortResult<Option<SessionEnrollment>> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM session_enrollment WHERE session_id = $1 AND employee_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(session_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(EnrollmentRecord::to_domain))
    }

    async fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
    ) -> PortResult<Vec<SessionEnrollment>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(ENROLLMENT_COLUMNS).push(" FROM session_enrollment WHERE TRUE");
        if let Some(session_ids) = &filter.session_ids {
            qb.push(" AND session_id = ANY(")
                .push_bind(session_ids.clone())
                .push(")");
        }
        if let Some(employee_id) = filter.employee_id {
            qb.push(" AND employee_id = ").push_bind(employee_id);
        }
        qb.push(" ORDER BY created_at ASC");
        let records = qb
            .build_query_as::<EnrollmentRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(EnrollmentRecord::to_domain).collect())
    }

    async fn create_enrollment(&self, enrollment: NewEnrollment) -> PortResult<SessionEnrollment> {
        let record = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "INSERT INTO session_enrollment (id, session_id, employee_id, notes) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(enrollment.session_id)
        .bind(enrollment.employee_id)
        .bind(&enrollment.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(or_conflict(
            "You are already enrolled in this session".to_string(),
        ))?;
        Ok(record.to_domain())
    }

    async fn delete_enrollment(&self, enrollment_id: Uuid) -> PortResult<()> {
        let deleted = sqlx::query("DELETE FROM session_enrollment WHERE id = $1")
            .bind(enrollment_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if deleted == 0 {
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
        if enrollment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "UPDATE session_enrollment \
             SET completed = TRUE, completion_date = $2, notes = $3 \
             WHERE id = ANY($1) RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_ids.to_vec())
        .bind(completion_date)
        .bind(notes)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(EnrollmentRecord::to_domain).collect())
    }
}
