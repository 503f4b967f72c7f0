//! crates/training_den_core/src/programs.rs
//!
//! Program aggregation: role-filtered program cards, the access check, and the
//! four role-specific detail shapes. Also holds the admin-only program writes,
//! since they share the session validation used by updates.

use chrono::{DateTime, Duration, Utc};
use futures::try_join;
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    parse_date, parse_datetime, AssignmentFilter, EnrollmentFilter, NewProgram, NewSession,
    ProgramChanges, ProgramFilter, Role, SessionEnrollment, SessionFilter, TrainingProgram,
    TrainingSession, User, UserFilter,
};
use crate::error::{optional, ServiceError, ServiceResult};
use crate::guard::ensure_role;
use crate::ports::{DatabaseService, PortResult};
use crate::users::user_index;
use crate::views::{
    AdminProgramDetail, AdminStats, AssignedEmployee, Deactivated, EmployeeInfo,
    EmployeeProgramDetail, EmployeeStats, EnrollmentInfo, ManagerProgramDetail, ProgramBase,
    ProgramCard, ProgramDetail, ProgramSession, ProgramWithSessions, TrainerProgramDetail,
    TrainerSession, TrainerStats,
};

/// Programs whose deadline falls within this many days count as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 14;

const PROGRAM_HIDDEN: &str = "Training program not found or inactive.";
const PROGRAM_FORBIDDEN: &str = "You do not have permission to access this program.";

//=========================================================================================
// Listing
//=========================================================================================

/// Active programs visible to the caller, each with its manager's name and
/// assignment count.
pub async fn training_program_cards(
    db: &dyn DatabaseService,
    caller: &User,
    upcoming_only: bool,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<ProgramCard>> {
    let mut filter = ProgramFilter {
        active_only: true,
        ..Default::default()
    };
    if upcoming_only {
        let today = now.date_naive();
        filter.deadline_from = Some(today);
        filter.deadline_to = Some(today + Duration::days(UPCOMING_WINDOW_DAYS));
    }

    match caller.role {
        Role::Admin => {}
        Role::Manager => filter.manager_id = Some(caller.id),
        Role::Trainer => {
            let sessions = db
                .list_sessions(&SessionFilter {
                    trainer_id: Some(caller.id),
                    active_only: true,
                    ..Default::default()
                })
                .await?;
            let ids: HashSet<Uuid> = sessions.iter().map(|s| s.program_id).collect();
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            filter.ids = Some(ids.into_iter().collect());
        }
        Role::Employee => {
            let assignments = db
                .list_assignments(&AssignmentFilter {
                    employee_id: Some(caller.id),
                    ..Default::default()
                })
                .await?;
            if assignments.is_empty() {
                return Ok(Vec::new());
            }
            filter.ids = Some(assignments.iter().map(|a| a.program_id).collect());
        }
    }

    let programs = db.list_programs(&filter).await?;
    if programs.is_empty() {
        return Ok(Vec::new());
    }

    let assignment_filter = AssignmentFilter {
        program_ids: Some(programs.iter().map(|p| p.id).collect()),
        ..Default::default()
    };
    let (assignments, users) = try_join!(
        db.list_assignments(&assignment_filter),
        user_index(db),
    )?;
    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for assignment in &assignments {
        *counts.entry(assignment.program_id).or_default() += 1;
    }

    Ok(programs
        .into_iter()
        .map(|p| ProgramCard {
            manager_name: display_name(&users, p.manager_id),
            enrollment_count: counts.get(&p.id).copied().unwrap_or(0),
            id: p.id,
            title: p.title,
            deadline: p.deadline,
        })
        .collect())
}

fn display_name(users: &HashMap<Uuid, User>, id: Uuid) -> String {
    users
        .get(&id)
        .map(User::full_name)
        .unwrap_or_else(|| "Unknown".to_string())
}

//=========================================================================================
// Access
//=========================================================================================

/// Whether `caller` may view `program`. Admins always may; everyone else only
/// while the program is active and they own, teach or are assigned to it.
pub async fn can_access_program(
    db: &dyn DatabaseService,
    caller: &User,
    program: &TrainingProgram,
) -> ServiceResult<bool> {
    if caller.is_admin() {
        return Ok(true);
    }
    if !program.is_active {
        return Ok(false);
    }
    match caller.role {
        Role::Admin => Ok(true),
        Role::Manager => Ok(program.manager_id == caller.id),
        Role::Trainer => {
            let sessions = db
                .list_sessions(&SessionFilter {
                    program_ids: Some(vec![program.id]),
                    trainer_id: Some(caller.id),
                    active_only: true,
                    ..Default::default()
                })
                .await?;
            Ok(!sessions.is_empty())
        }
        Role::Employee => Ok(db
            .find_assignment(program.id, caller.id)
            .await?
            .is_some()),
    }
}

//=========================================================================================
// Detail
//=========================================================================================

/// Builds the detail shape for the caller's role. A missing or inactive program
/// is `NotFound` for every role; denied access is `Forbidden`.
pub async fn program_detail(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<ProgramDetail> {
    // 1. Resolve the program
    let program = optional(db.get_program(program_id).await)?
        .filter(|p| p.is_active)
        .ok_or_else(|| ServiceError::not_found(PROGRAM_HIDDEN))?;

    // 2. Access check
    if !can_access_program(db, caller, &program).await? {
        return Err(ServiceError::forbidden(PROGRAM_FORBIDDEN));
    }

    // 3. Role dispatch
    match caller.role {
        Role::Admin => admin_detail(db, program, now).await.map(ProgramDetail::Admin),
        Role::Manager => manager_detail(db, program).await.map(ProgramDetail::Manager),
        Role::Trainer => trainer_detail(db, program, caller.id)
            .await
            .map(ProgramDetail::Trainer),
        Role::Employee => employee_detail(db, program, caller.id)
            .await
            .map(ProgramDetail::Employee),
    }
}

async fn active_sessions(
    db: &dyn DatabaseService,
    program_id: Uuid,
) -> PortResult<Vec<TrainingSession>> {
    db.list_sessions(&SessionFilter {
        program_ids: Some(vec![program_id]),
        active_only: true,
        ..Default::default()
    })
    .await
}

async fn session_enrollments(
    db: &dyn DatabaseService,
    sessions: &[TrainingSession],
    employee_id: Option<Uuid>,
) -> ServiceResult<Vec<SessionEnrollment>> {
    if sessions.is_empty() {
        return Ok(Vec::new());
    }
    Ok(db
        .list_enrollments(&EnrollmentFilter {
            session_ids: Some(sessions.iter().map(|s| s.id).collect()),
            employee_id,
        })
        .await?)
}

fn base(program: &TrainingProgram, users: &HashMap<Uuid, User>) -> ProgramBase {
    ProgramBase::new(program, display_name(users, program.manager_id))
}

fn session_views(
    sessions: &[TrainingSession],
    users: &HashMap<Uuid, User>,
) -> Vec<ProgramSession> {
    sessions
        .iter()
        .map(|s| ProgramSession::new(s, users.get(&s.trainer_id).map(User::full_name)))
        .collect()
}

fn enrollment_views(
    enrollments: &[SessionEnrollment],
    users: &HashMap<Uuid, User>,
) -> Vec<EnrollmentInfo> {
    enrollments
        .iter()
        .filter_map(|e| {
            users.get(&e.employee_id).map(|employee| EnrollmentInfo {
                id: e.id,
                employee: EmployeeInfo::from(employee),
                session_id: e.session_id,
                completed: e.completed,
                completion_date: e.completion_date,
                notes: e.notes.clone(),
            })
        })
        .collect()
}

async fn admin_detail(
    db: &dyn DatabaseService,
    program: TrainingProgram,
    now: DateTime<Utc>,
) -> ServiceResult<AdminProgramDetail> {
    let assignment_filter = AssignmentFilter {
        program_ids: Some(vec![program.id]),
        ..Default::default()
    };
    let (sessions, assignments, users) = try_join!(
        active_sessions(db, program.id),
        db.list_assignments(&assignment_filter),
        user_index(db),
    )?;
    let enrollments = session_enrollments(db, &sessions, None).await?;

    let starts: HashMap<Uuid, DateTime<Utc>> = sessions
        .iter()
        .map(|s| (s.id, s.session_datetime))
        .collect();
    let stats = AdminStats {
        total_enrolled: assignments.len() as u64,
        completed: enrollments.iter().filter(|e| e.completed).count() as u64,
        overdue: enrollments
            .iter()
            .filter(|e| !e.completed && starts.get(&e.session_id).is_some_and(|t| *t < now))
            .count() as u64,
    };

    Ok(AdminProgramDetail {
        base: base(&program, &users),
        sessions: session_views(&sessions, &users),
        enrolled_employees: enrollment_views(&enrollments, &users),
        stats,
    })
}

async fn manager_detail(
    db: &dyn DatabaseService,
    program: TrainingProgram,
) -> ServiceResult<ManagerProgramDetail> {
    let assignment_filter = AssignmentFilter {
        program_ids: Some(vec![program.id]),
        ..Default::default()
    };
    let employee_filter = UserFilter {
        role: Some(Role::Employee),
        is_active: Some(true),
        search: None,
    };
    let (assignments, employees, users) = try_join!(
        db.list_assignments(&assignment_filter),
        db.list_users(&employee_filter),
        user_index(db),
    )?;

    let assigned_ids: HashSet<Uuid> = assignments.iter().map(|a| a.employee_id).collect();
    let assigned_employees = assignments
        .iter()
        .filter_map(|a| {
            users.get(&a.employee_id).map(|employee| AssignedEmployee {
                id: a.id,
                employee: EmployeeInfo::from(employee),
                assigned_by_manager_id: a.assigned_by_manager_id,
                notes: a.notes.clone(),
                created_at: a.created_at,
            })
        })
        .collect();
    let available_employees = employees
        .iter()
        .filter(|e| !assigned_ids.contains(&e.id))
        .map(EmployeeInfo::from)
        .collect();

    Ok(ManagerProgramDetail {
        base: base(&program, &users),
        assigned_employees,
        available_employees,
    })
}

async fn trainer_detail(
    db: &dyn DatabaseService,
    program: TrainingProgram,
    trainer_id: Uuid,
) -> ServiceResult<TrainerProgramDetail> {
    let (sessions, users) = try_join!(active_sessions(db, program.id), user_index(db))?;
    let enrollments = session_enrollments(db, &sessions, None).await?;

    let stats = TrainerStats {
        total_enrolled: enrollments.len() as u64,
        completed: enrollments.iter().filter(|e| e.completed).count() as u64,
    };
    let flagged = session_views(&sessions, &users)
        .into_iter()
        .map(|session| TrainerSession {
            is_owner: session.trainer_id == trainer_id,
            session,
        })
        .collect();

    Ok(TrainerProgramDetail {
        base: base(&program, &users),
        sessions: flagged,
        enrolled_employees: enrollment_views(&enrollments, &users),
        stats,
    })
}

async fn employee_detail(
    db: &dyn DatabaseService,
    program: TrainingProgram,
    employee_id: Uuid,
) -> ServiceResult<EmployeeProgramDetail> {
    let (sessions, users) = try_join!(active_sessions(db, program.id), user_index(db))?;
    let mine = session_enrollments(db, &sessions, Some(employee_id)).await?;

    let enrolled = mine.len() as u64;
    let stats = EmployeeStats {
        enrolled,
        completed: mine.iter().filter(|e| e.completed).count() as u64,
        available: (sessions.len() as u64).saturating_sub(enrolled),
    };

    Ok(EmployeeProgramDetail {
        base: base(&program, &users),
        sessions: session_views(&sessions, &users),
        my_enrollments: enrollment_views(&mine, &users),
        stats,
    })
}

//=========================================================================================
// Admin Writes
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct CreateSession {
    pub session_datetime: Option<String>,
    pub duration_minutes: Option<i32>,
    pub trainer_id: Option<Uuid>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateProgram {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub manager_id: Option<Uuid>,
    pub deadline: Option<String>,
    pub is_active: Option<bool>,
    pub sessions: Option<Vec<CreateSession>>,
}

/// Partial program update; `sessions`, when present, replaces every session.
#[derive(Debug, Clone, Default)]
pub struct UpdateProgram {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub manager_id: Option<Uuid>,
    pub deadline: Option<String>,
    pub is_active: Option<bool>,
    pub sessions: Option<Vec<CreateSession>>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn ensure_active_role(
    users: &HashMap<Uuid, User>,
    id: Uuid,
    role: Role,
    message: String,
) -> ServiceResult<()> {
    match users.get(&id) {
        Some(user) if user.role == role && user.is_active => Ok(()),
        _ => Err(ServiceError::BadRequest(message)),
    }
}

fn validate_sessions(
    sessions: Option<Vec<CreateSession>>,
    users: &HashMap<Uuid, User>,
) -> ServiceResult<Vec<NewSession>> {
    let sessions = sessions
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::bad_request("At least one session is required"))?;

    sessions
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let n = i + 1;
            let (Some(raw), Some(duration), Some(trainer_id)) = (
                s.session_datetime.filter(|d| !d.trim().is_empty()),
                s.duration_minutes.filter(|d| *d > 0),
                s.trainer_id,
            ) else {
                return Err(ServiceError::BadRequest(format!(
                    "Session {} is missing required fields",
                    n
                )));
            };
            let session_datetime = parse_datetime(&raw).map_err(|e| {
                ServiceError::BadRequest(format!("Session {} has an {}", n, e))
            })?;
            ensure_active_role(
                users,
                trainer_id,
                Role::Trainer,
                format!("Session {} trainer must be an active trainer", n),
            )?;
            Ok(NewSession {
                trainer_id,
                session_datetime,
                duration_minutes: duration,
                notes: s.notes.filter(|note| !note.trim().is_empty()),
                is_active: s.is_active.unwrap_or(true),
            })
        })
        .collect()
}

const MANAGER_REQUIRED: &str = "manager_id must reference an active manager";

/// Creates a program with its initial sessions in one atomic write.
pub async fn create_program(
    db: &dyn DatabaseService,
    caller: &User,
    input: CreateProgram,
) -> ServiceResult<ProgramWithSessions> {
    ensure_role(caller, &[Role::Admin])?;

    // 1. Required fields
    let (false, Some(manager_id), false) =
        (blank(&input.title), input.manager_id, blank(&input.deadline))
    else {
        return Err(ServiceError::bad_request(
            "Missing required fields: title, manager_id, deadline",
        ));
    };
    let title = input.title.unwrap_or_default().trim().to_string();
    let deadline = parse_date(input.deadline.as_deref().unwrap_or_default())
        .map_err(ServiceError::BadRequest)?;

    // 2. Referenced users and sessions
    let users = user_index(db).await?;
    let sessions = validate_sessions(input.sessions, &users)?;
    ensure_active_role(&users, manager_id, Role::Manager, MANAGER_REQUIRED.to_string())?;

    // 3. Atomic insert
    let (program, sessions) = db
        .create_program(
            NewProgram {
                title,
                notes: input.notes.filter(|n| !n.trim().is_empty()),
                manager_id,
                deadline,
                is_active: input.is_active.unwrap_or(true),
            },
            sessions,
        )
        .await?;
    info!(program_id = %program.id, sessions = sessions.len(), caller = %caller.id, "Training program created");
    Ok(ProgramWithSessions { program, sessions })
}

pub async fn update_program(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
    input: UpdateProgram,
) -> ServiceResult<ProgramWithSessions> {
    ensure_role(caller, &[Role::Admin])?;
    optional(db.get_program(program_id).await)?
        .ok_or_else(|| ServiceError::not_found("Program not found"))?;

    if input.title.is_some() && blank(&input.title) {
        return Err(ServiceError::bad_request("Title cannot be empty"));
    }
    let deadline = input
        .deadline
        .as_deref()
        .map(parse_date)
        .transpose()
        .map_err(ServiceError::BadRequest)?;

    let users = user_index(db).await?;
    if let Some(manager_id) = input.manager_id {
        ensure_active_role(&users, manager_id, Role::Manager, MANAGER_REQUIRED.to_string())?;
    }
    let sessions = match input.sessions {
        Some(sessions) => Some(validate_sessions(Some(sessions), &users)?),
        None => None,
    };
    let replaced = sessions.is_some();

    let changes = ProgramChanges {
        title: input.title.map(|t| t.trim().to_string()),
        notes: input.notes,
        manager_id: input.manager_id,
        deadline,
        is_active: input.is_active,
    };
    let (program, sessions) = db.update_program(program_id, changes, sessions).await?;
    info!(program_id = %program.id, sessions_replaced = replaced, caller = %caller.id, "Training program updated");
    Ok(ProgramWithSessions { program, sessions })
}

/// Soft delete: the program disappears from every listing and detail view.
pub async fn deactivate_program(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
) -> ServiceResult<Deactivated> {
    ensure_role(caller, &[Role::Admin])?;
    optional(db.get_program(program_id).await)?
        .ok_or_else(|| ServiceError::not_found("Program not found"))?;
    let (program, _) = db
        .update_program(
            program_id,
            ProgramChanges {
                is_active: Some(false),
                ..Default::default()
            },
            None,
        )
        .await?;
    info!(program_id = %program.id, caller = %caller.id, "Training program deactivated");
    Ok(Deactivated {
        id: program.id,
        is_active: program.is_active,
    })
}
