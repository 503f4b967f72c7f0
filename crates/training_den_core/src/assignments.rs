//! crates/training_den_core/src/assignments.rs
//!
//! Program assignment mutators. Only the manager who owns a program may change
//! who is assigned to it, and removing an assignment also removes the
//! employee's enrollments in that program's sessions.

use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    AssignmentFilter, NewAssignment, Role, TrainingProgram, User, UserFilter,
};
use crate::error::{optional, ServiceError, ServiceResult};
use crate::guard::ensure_role_or;
use crate::ports::DatabaseService;
use crate::views::{
    AssignAllResult, AssignmentCreated, AssignmentRemoved, EmployeeInfo, RemoveAllResult,
};

const ONLY_MANAGERS_ASSIGN: &str = "Only managers can assign employees to programs";
const ONLY_MANAGERS_REMOVE: &str = "Only managers can remove employee assignments";
const FOREIGN_ASSIGN: &str = "You can only assign employees to your own programs";
const FOREIGN_MANAGE: &str = "You can only manage your own programs";

#[derive(Debug, Clone, Default)]
pub struct AssignEmployee {
    pub employee_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Fetches the program and checks that `caller` manages it.
async fn owned_program(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
    foreign: &str,
) -> ServiceResult<TrainingProgram> {
    let program = optional(db.get_program(program_id).await)?
        .ok_or_else(|| ServiceError::not_found("Program not found"))?;
    if program.manager_id != caller.id {
        return Err(ServiceError::forbidden(foreign));
    }
    Ok(program)
}

pub async fn assign_employee(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
    input: AssignEmployee,
) -> ServiceResult<AssignmentCreated> {
    // 1. Role and input
    ensure_role_or(caller, &[Role::Manager], ONLY_MANAGERS_ASSIGN)?;
    let employee_id = input
        .employee_id
        .ok_or_else(|| ServiceError::bad_request("Employee ID is required"))?;

    // 2. Ownership
    let program = owned_program(db, caller, program_id, FOREIGN_ASSIGN).await?;

    // 3. Employee state
    let employee = optional(db.get_user_by_id(employee_id).await)?
        .ok_or_else(|| ServiceError::not_found("Employee not found"))?;
    if employee.role != Role::Employee {
        return Err(ServiceError::bad_request(
            "Can only assign users with employee role",
        ));
    }
    if !employee.is_active {
        return Err(ServiceError::bad_request("Cannot assign inactive employees"));
    }
    if db.find_assignment(program.id, employee.id).await?.is_some() {
        return Err(ServiceError::bad_request(
            "Employee is already assigned to this program",
        ));
    }

    // 4. Write
    let mut created = db
        .create_assignments(vec![NewAssignment {
            program_id: program.id,
            employee_id: employee.id,
            assigned_by_manager_id: caller.id,
            notes: input.notes.filter(|n| !n.trim().is_empty()),
        }])
        .await?;
    let assignment = created
        .pop()
        .ok_or_else(|| ServiceError::Internal("Assignment insert returned no row".into()))?;
    info!(program_id = %program.id, employee_id = %employee.id, caller = %caller.id, "Employee assigned");

    Ok(AssignmentCreated {
        id: assignment.id,
        employee: EmployeeInfo::from(&employee),
        created_at: assignment.created_at,
    })
}

/// Assigns every active employee not yet assigned to the program.
pub async fn assign_all(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
) -> ServiceResult<AssignAllResult> {
    ensure_role_or(caller, &[Role::Manager], ONLY_MANAGERS_ASSIGN)?;
    let program = owned_program(db, caller, program_id, FOREIGN_ASSIGN).await?;

    let assigned: HashSet<Uuid> = db
        .list_assignments(&AssignmentFilter {
            program_ids: Some(vec![program.id]),
            ..Default::default()
        })
        .await?
        .into_iter()
        .map(|a| a.employee_id)
        .collect();
    let pending: Vec<NewAssignment> = db
        .list_users(&UserFilter {
            role: Some(Role::Employee),
            is_active: Some(true),
            search: None,
        })
        .await?
        .into_iter()
        .filter(|e| !assigned.contains(&e.id))
        .map(|e| NewAssignment {
            program_id: program.id,
            employee_id: e.id,
            assigned_by_manager_id: caller.id,
            notes: None,
        })
        .collect();

    if pending.is_empty() {
        return Ok(AssignAllResult {
            assigned: 0,
            message: "No available employees to assign".to_string(),
        });
    }

    let created = db.create_assignments(pending).await?.len() as u64;
    info!(program_id = %program.id, assigned = created, caller = %caller.id, "Employees bulk assigned");
    Ok(AssignAllResult {
        assigned: created,
        message: format!("Successfully assigned {} employees", created),
    })
}

pub async fn remove_assignment(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
    employee_id: Uuid,
) -> ServiceResult<AssignmentRemoved> {
    ensure_role_or(caller, &[Role::Manager], ONLY_MANAGERS_REMOVE)?;
    let program = owned_program(db, caller, program_id, FOREIGN_MANAGE).await?;

    if db.find_assignment(program.id, employee_id).await?.is_none() {
        return Err(ServiceError::not_found("Assignment not found"));
    }
    let removed = db
        .remove_assignments(program.id, Some(vec![employee_id]))
        .await?;
    info!(
        program_id = %program.id,
        employee_id = %employee_id,
        enrollments_removed = removed.enrollments,
        caller = %caller.id,
        "Employee removed from program"
    );
    Ok(AssignmentRemoved {
        employee_id,
        enrollments_removed: removed.enrollments,
    })
}

pub async fn remove_all(
    db: &dyn DatabaseService,
    caller: &User,
    program_id: Uuid,
) -> ServiceResult<RemoveAllResult> {
    ensure_role_or(caller, &[Role::Manager], ONLY_MANAGERS_REMOVE)?;
    let program = owned_program(db, caller, program_id, FOREIGN_MANAGE).await?;

    let removed = db.remove_assignments(program.id, None).await?;
    if removed.assignments == 0 {
        return Ok(RemoveAllResult {
            removed: 0,
            enrollments_removed: 0,
            message: "No assignments to remove".to_string(),
        });
    }
    info!(
        program_id = %program.id,
        removed = removed.assignments,
        enrollments_removed = removed.enrollments,
        caller = %caller.id,
        "All assignments removed"
    );
    Ok(RemoveAllResult {
        removed: removed.assignments,
        enrollments_removed: removed.enrollments,
        message: format!(
            "Successfully removed {} employee assignments",
            removed.assignments
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnrollmentFilter;
    use crate::fixtures::Fixture;

    fn assign(employee: &User) -> AssignEmployee {
        AssignEmployee {
            employee_id: Some(employee.id),
            notes: None,
        }
    }

    #[tokio::test]
    async fn assigning_twice_is_rejected() {
        let f = Fixture::new().await;
        let (program, _) = f.program(&f.manager, &[(&f.trainer, 1)]).await;

        let created = assign_employee(&*f.db, &f.manager, program.id, assign(&f.employee))
            .await
            .unwrap();
        assert_eq!(created.employee.id, f.employee.id);
        assert_eq!(created.employee.full_name, "Eve Employee");

        let err = assign_employee(&*f.db, &f.manager, program.id, assign(&f.employee))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::BadRequest("Employee is already assigned to this program".into())
        );
    }

    #[tokio::test]
    async fn assignment_checks_run_in_order() {
        let f = Fixture::new().await;
        let (program, _) = f.program(&f.manager, &[(&f.trainer, 1)]).await;

        let err = assign_employee(&*f.db, &f.admin, program.id, assign(&f.employee))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden(ONLY_MANAGERS_ASSIGN.into()));

        let err = assign_employee(&*f.db, &f.manager, Uuid::new_v4(), assign(&f.employee))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("Program not found".into()));

        let err = assign_employee(&*f.db, &f.other_manager, program.id, assign(&f.employee))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden(FOREIGN_ASSIGN.into()));

        let err = assign_employee(&*f.db, &f.manager, program.id, assign(&f.trainer))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::BadRequest("Can only assign users with employee role".into())
        );

        f.deactivate(&f.other_employee).await;
        let err = assign_employee(&*f.db, &f.manager, program.id, assign(&f.other_employee))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::BadRequest("Cannot assign inactive employees".into())
        );

        let err = assign_employee(&*f.db, &f.manager, program.id, AssignEmployee::default())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::BadRequest("Employee ID is required".into()));
    }

    #[tokio::test]
    async fn assign_all_fills_the_gap_and_reports_zero_after() {
        let f = Fixture::new().await;
        let (program, _) = f.program(&f.manager, &[(&f.trainer, 1)]).await;
        f.assign(&program, &f.employee).await;

        let result = assign_all(&*f.db, &f.manager, program.id).await.unwrap();
        assert_eq!(result.assigned, 1);
        assert!(f
            .db
            .find_assignment(program.id, f.other_employee.id)
            .await
            .unwrap()
            .is_some());

        let again = assign_all(&*f.db, &f.manager, program.id).await.unwrap();
        assert_eq!(again.assigned, 0);
    }

    #[tokio::test]
    async fn removing_an_assignment_cascades_to_enrollments() {
        let f = Fixture::new().await;
        let (program, sessions) = f
            .program(&f.manager, &[(&f.trainer, 1), (&f.trainer, 2)])
            .await;
        let (other_program, other_sessions) = f.program(&f.manager, &[(&f.trainer, 3)]).await;
        f.assign(&program, &f.employee).await;
        f.assign(&other_program, &f.employee).await;
        f.enroll(&sessions[0], &f.employee).await;
        f.enroll(&sessions[1], &f.employee).await;
        f.enroll(&other_sessions[0], &f.employee).await;

        let removed = remove_assignment(&*f.db, &f.manager, program.id, f.employee.id)
            .await
            .unwrap();
        assert_eq!(removed.enrollments_removed, 2);
        assert!(f
            .db
            .find_assignment(program.id, f.employee.id)
            .await
            .unwrap()
            .is_none());

        let remaining = f
            .db
            .list_enrollments(&EnrollmentFilter {
                employee_id: Some(f.employee.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, other_sessions[0].id);

        let err = remove_assignment(&*f.db, &f.manager, program.id, f.employee.id)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("Assignment not found".into()));
    }

    #[tokio::test]
    async fn remove_all_clears_program_assignments() {
        let f = Fixture::new().await;
        let (program, sessions) = f.program(&f.manager, &[(&f.trainer, 1)]).await;
        f.assign(&program, &f.employee).await;
        f.assign(&program, &f.other_employee).await;
        f.enroll(&sessions[0], &f.employee).await;

        let err = remove_all(&*f.db, &f.other_manager, program.id)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden(FOREIGN_MANAGE.into()));

        let result = remove_all(&*f.db, &f.manager, program.id).await.unwrap();
        assert_eq!((result.removed, result.enrollments_removed), (2, 1));

        let empty = remove_all(&*f.db, &f.manager, program.id).await.unwrap();
        assert_eq!(empty.removed, 0);
    }
}
