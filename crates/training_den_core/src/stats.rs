//! crates/training_den_core/src/stats.rs
//!
//! Read-only counters and dashboard aggregations. Nothing here writes, so every
//! function can be retried freely.

use chrono::{DateTime, Utc};
use futures::try_join;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{
    AssignmentFilter, EnrollmentFilter, ProgramFilter, Role, SessionFilter, User,
};
use crate::error::ServiceResult;
use crate::guard::{ensure_role, ensure_self_scope};
use crate::ports::DatabaseService;
use crate::users::user_index;
use crate::views::{
    ActiveProgramCount, ActiveSessionCount, AdminDashboardStats, CompletionRate,
    EmployeeDashboardStats, UpcomingSession,
};

pub const UPCOMING_LIMIT: usize = 5;

/// Roles allowed to query the ad-hoc counters under `/api/stats`.
const STATS_ROLES: [Role; 3] = [Role::Admin, Role::Manager, Role::Trainer];

//=========================================================================================
// Counters
//=========================================================================================

pub async fn count_users_by_role(db: &dyn DatabaseService, role: Role) -> ServiceResult<u64> {
    Ok(db.count_active_users_by_role(role).await?)
}

pub async fn count_programs(
    db: &dyn DatabaseService,
    manager_id: Option<Uuid>,
) -> ServiceResult<u64> {
    Ok(db.count_active_programs(manager_id).await?)
}

pub async fn count_sessions(
    db: &dyn DatabaseService,
    trainer_id: Option<Uuid>,
) -> ServiceResult<u64> {
    Ok(db.count_active_sessions(trainer_id).await?)
}

pub async fn completion_rate(db: &dyn DatabaseService) -> ServiceResult<CompletionRate> {
    let enrollments = db.list_enrollments(&EnrollmentFilter::default()).await?;
    let total = enrollments.len() as u64;
    let completed = enrollments.iter().filter(|e| e.completed).count() as u64;
    Ok(CompletionRate {
        total,
        completed,
        rate: rate_percent(completed, total),
    })
}

fn rate_percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = completed as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

//=========================================================================================
// Role-scoped Endpoints
//=========================================================================================

pub async fn scoped_session_count(
    db: &dyn DatabaseService,
    caller: &User,
    trainer_id: Option<Uuid>,
) -> ServiceResult<ActiveSessionCount> {
    ensure_role(caller, &STATS_ROLES)?;
    ensure_self_scope(caller, trainer_id)?;
    Ok(ActiveSessionCount {
        active_sessions: count_sessions(db, trainer_id).await?,
    })
}

pub async fn scoped_program_count(
    db: &dyn DatabaseService,
    caller: &User,
    manager_id: Option<Uuid>,
) -> ServiceResult<ActiveProgramCount> {
    ensure_role(caller, &STATS_ROLES)?;
    ensure_self_scope(caller, manager_id)?;
    Ok(ActiveProgramCount {
        active_programs: count_programs(db, manager_id).await?,
    })
}

pub async fn scoped_completion_rate(
    db: &dyn DatabaseService,
    caller: &User,
) -> ServiceResult<CompletionRate> {
    ensure_role(caller, &STATS_ROLES)?;
    completion_rate(db).await
}

pub async fn admin_dashboard(
    db: &dyn DatabaseService,
    caller: &User,
) -> ServiceResult<AdminDashboardStats> {
    ensure_role(caller, &[Role::Admin])?;
    let (admins, employees, managers, trainers, active_sessions, active_programs) = try_join!(
        db.count_active_users_by_role(Role::Admin),
        db.count_active_users_by_role(Role::Employee),
        db.count_active_users_by_role(Role::Manager),
        db.count_active_users_by_role(Role::Trainer),
        db.count_active_sessions(None),
        db.count_active_programs(None),
    )?;
    Ok(AdminDashboardStats {
        admins,
        employees,
        managers,
        trainers,
        active_sessions,
        active_programs,
    })
}

//=========================================================================================
// Employee Dashboard
//=========================================================================================

pub async fn employee_dashboard_stats(
    db: &dyn DatabaseService,
    caller: &User,
    now: DateTime<Utc>,
) -> ServiceResult<EmployeeDashboardStats> {
    ensure_role(caller, &[Role::Employee])?;
    let employee_id = caller.id;

    let enrollment_filter = EnrollmentFilter {
        employee_id: Some(employee_id),
        ..Default::default()
    };
    let assignment_filter = AssignmentFilter {
        employee_id: Some(employee_id),
        ..Default::default()
    };
    let (enrollments, assignments) = try_join!(
        db.list_enrollments(&enrollment_filter),
        db.list_assignments(&assignment_filter),
    )?;

    let enrolled_session_ids: HashSet<Uuid> = enrollments.iter().map(|e| e.session_id).collect();
    let active_sessions: HashMap<Uuid, DateTime<Utc>> = db
        .list_sessions(&SessionFilter {
            ids: Some(enrolled_session_ids.iter().copied().collect()),
            active_only: true,
            ..Default::default()
        })
        .await?
        .into_iter()
        .map(|s| (s.id, s.session_datetime))
        .collect();

    let mut stats = EmployeeDashboardStats {
        total_enrolled: 0,
        overdue: 0,
        completed: 0,
        available: 0,
    };
    for enrollment in &enrollments {
        let Some(starts_at) = active_sessions.get(&enrollment.session_id) else {
            continue;
        };
        stats.total_enrolled += 1;
        if enrollment.completed {
            stats.completed += 1;
        } else if *starts_at < now {
            stats.overdue += 1;
        }
    }

    if !assignments.is_empty() {
        let program_ids = assignments.iter().map(|a| a.program_id).collect();
        stats.available = db
            .list_sessions(&SessionFilter {
                program_ids: Some(program_ids),
                active_only: true,
                ..Default::default()
            })
            .await?
            .iter()
            .filter(|s| !enrolled_session_ids.contains(&s.id))
            .count() as u64;
    }
    Ok(stats)
}

/// The caller's incomplete enrollments in active sessions that have not started yet.
pub async fn upcoming_enrolled_sessions(
    db: &dyn DatabaseService,
    caller: &User,
    now: DateTime<Utc>,
    limit: usize,
) -> ServiceResult<Vec<UpcomingSession>> {
    ensure_role(caller, &[Role::Employee])?;

    let pending: Vec<_> = db
        .list_enrollments(&EnrollmentFilter {
            employee_id: Some(caller.id),
            ..Default::default()
        })
        .await?
        .into_iter()
        .filter(|e| !e.completed)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let sessions = db
        .list_sessions(&SessionFilter {
            ids: Some(pending.iter().map(|e| e.session_id).collect()),
            active_only: true,
            ..Default::default()
        })
        .await?;
    let mut upcoming: Vec<_> = sessions
        .into_iter()
        .filter(|s| s.session_datetime >= now)
        .filter_map(|s| {
            pending
                .iter()
                .find(|e| e.session_id == s.id)
                .map(|e| (e.id, s))
        })
        .collect();
    upcoming.sort_by_key(|(_, s)| s.session_datetime);
    upcoming.truncate(limit);

    let program_ids: Vec<Uuid> = upcoming.iter().map(|(_, s)| s.program_id).collect();
    let program_filter = ProgramFilter {
        ids: Some(program_ids),
        ..Default::default()
    };
    let (programs, users) = try_join!(db.list_programs(&program_filter), user_index(db))?;
    let titles: HashMap<Uuid, String> = programs.into_iter().map(|p| (p.id, p.title)).collect();

    Ok(upcoming
        .into_iter()
        .map(|(enrollment_id, s)| UpcomingSession {
            enrollment_id,
            session_id: s.id,
            session_datetime: s.session_datetime,
            duration_minutes: s.duration_minutes,
            notes: s.notes,
            trainer_name: users.get(&s.trainer_id).map(User::full_name),
            program_id: s.program_id,
            program_title: titles.get(&s.program_id).cloned().unwrap_or_default(),
        })
        .collect())
}
