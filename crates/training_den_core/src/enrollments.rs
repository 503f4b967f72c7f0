//! crates/training_den_core/src/enrollments.rs
//!
//! Session enrollment mutators. Employees enroll themselves into sessions of
//! programs they are assigned to; the trainer who owns a session marks its
//! enrollments complete. Completion is one-way.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::{EnrollmentFilter, NewEnrollment, Role, SessionEnrollment, TrainingSession, User};
use crate::error::{optional, ServiceError, ServiceResult};
use crate::guard::ensure_role_or;
use crate::ports::DatabaseService;
use crate::views::CompleteAllResult;

const ONLY_TRAINERS_COMPLETE: &str = "Only trainers can mark enrollments as complete";
const FOREIGN_SESSION: &str = "You can only mark completions for your own sessions";

#[derive(Debug, Clone, Default)]
pub struct MarkComplete {
    pub completed: Option<bool>,
    pub notes: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn session_or_not_found(
    db: &dyn DatabaseService,
    session_id: Uuid,
) -> ServiceResult<TrainingSession> {
    optional(db.get_session(session_id).await)?
        .ok_or_else(|| ServiceError::not_found("Session not found"))
}

pub async fn enroll(
    db: &dyn DatabaseService,
    caller: &User,
    session_id: Uuid,
    notes: Option<String>,
) -> ServiceResult<SessionEnrollment> {
    ensure_role_or(caller, &[Role::Employee], "Only employees can enroll in sessions")?;

    let session = session_or_not_found(db, session_id).await?;
    if !session.is_active {
        return Err(ServiceError::bad_request("Cannot enroll in inactive session"));
    }
    if db
        .find_assignment(session.program_id, caller.id)
        .await?
        .is_none()
    {
        return Err(ServiceError::forbidden(
            "You must be assigned to this program to enroll in sessions",
        ));
    }
    if db.find_enrollment(session.id, caller.id).await?.is_some() {
        return Err(ServiceError::bad_request(
            "You are already enrolled in this session",
        ));
    }

    let enrollment = db
        .create_enrollment(NewEnrollment {
            session_id: session.id,
            employee_id: caller.id,
            notes: non_blank(notes),
        })
        .await?;
    info!(session_id = %session.id, enrollment_id = %enrollment.id, caller = %caller.id, "Enrolled in session");
    Ok(enrollment)
}

pub async fn unenroll(
    db: &dyn DatabaseService,
    caller: &User,
    session_id: Uuid,
) -> ServiceResult<()> {
    ensure_role_or(
        caller,
        &[Role::Employee],
        "Only employees can unenroll from sessions",
    )?;

    let enrollment = db
        .find_enrollment(session_id, caller.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Enrollment not found"))?;
    if enrollment.completed {
        return Err(ServiceError::bad_request(
            "Cannot unenroll from completed sessions",
        ));
    }
    db.delete_enrollment(enrollment.id).await?;
    info!(session_id = %session_id, enrollment_id = %enrollment.id, caller = %caller.id, "Unenrolled from session");
    Ok(())
}

/// Marks one enrollment complete. Re-marking a completed enrollment is allowed
/// and refreshes its completion date.
pub async fn mark_complete(
    db: &dyn DatabaseService,
    caller: &User,
    enrollment_id: Uuid,
    input: MarkComplete,
    now: DateTime<Utc>,
) -> ServiceResult<SessionEnrollment> {
    ensure_role_or(caller, &[Role::Trainer], ONLY_TRAINERS_COMPLETE)?;
    if input.completed != Some(true) {
        return Err(ServiceError::bad_request(
            "Can only mark enrollments as complete, not incomplete",
        ));
    }

    let enrollment = optional(db.get_enrollment(enrollment_id).await)?
        .ok_or_else(|| ServiceError::not_found("Enrollment not found"))?;
    let session = session_or_not_found(db, enrollment.session_id).await?;
    if session.trainer_id != caller.id {
        return Err(ServiceError::forbidden(FOREIGN_SESSION));
    }

    let notes = non_blank(input.notes).or(enrollment.notes);
    let updated = db
        .complete_enrollments(&[enrollment.id], now, notes)
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("Enrollment not found"))?;
    info!(enrollment_id = %updated.id, caller = %caller.id, "Enrollment marked complete");
    Ok(updated)
}

/// Marks every incomplete enrollment of a session complete with one shared
/// completion date.
pub async fn complete_all(
    db: &dyn DatabaseService,
    caller: &User,
    session_id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> ServiceResult<CompleteAllResult> {
    ensure_role_or(caller, &[Role::Trainer], ONLY_TRAINERS_COMPLETE)?;
    let session = session_or_not_found(db, session_id).await?;
    if session.trainer_id != caller.id {
        return Err(ServiceError::forbidden(FOREIGN_SESSION));
    }

    let enrollments = db
        .list_enrollments(&EnrollmentFilter {
            session_ids: Some(vec![session.id]),
            ..Default::default()
        })
        .await?;
    if enrollments.is_empty() {
        return Ok(CompleteAllResult {
            updated: 0,
            already_completed: 0,
            message: "No enrollments found for this session".to_string(),
        });
    }

    let pending: Vec<Uuid> = enrollments
        .iter()
        .filter(|e| !e.completed)
        .map(|e| e.id)
        .collect();
    let already_completed = (enrollments.len() - pending.len()) as u64;
    if pending.is_empty() {
        return Ok(CompleteAllResult {
            updated: 0,
            already_completed,
            message: "All enrollments already completed".to_string(),
        });
    }

    let updated = db
        .complete_enrollments(&pending, now, non_blank(notes))
        .await?
        .len() as u64;
    info!(session_id = %session.id, updated, already_completed, caller = %caller.id, "Session enrollments completed");
    Ok(CompleteAllResult {
        updated,
        already_completed,
        message: format!("Marked {} enrollments as complete", updated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewSession, ProgramChanges};
    use crate::fixtures::{now, Fixture};
    use chrono::Duration;

    fn complete(notes: Option<&str>) -> MarkComplete {
        MarkComplete {
            completed: Some(true),
            notes: notes.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn enrollment_requires_assignment() {
        let f = Fixture::new().await;
        let (program, sessions) = f.program(&f.manager, &[(&f.trainer, 1)]).await;

        let err = enroll(&*f.db, &f.employee, sessions[0].id, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Forbidden(
                "You must be assigned to this program to enroll in sessions".into()
            )
        );

        f.assign(&program, &f.employee).await;
        let enrollment = enroll(&*f.db, &f.employee, sessions[0].id, Some("front row".into()))
            .await
            .unwrap();
        assert!(!enrollment.completed);
        assert!(enrollment.completion_date.is_none());
        assert_eq!(enrollment.notes.as_deref(), Some("front row"));

        let err = enroll(&*f.db, &f.employee, sessions[0].id, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::BadRequest("You are already enrolled in this session".into())
        );
    }

    #[tokio::test]
    async fn enrollment_rejects_wrong_role_and_inactive_sessions() {
        let f = Fixture::new().await;
        let (program, _) = f.program(&f.manager, &[(&f.trainer, 1)]).await;
        f.assign(&program, &f.employee).await;
        let (_, sessions) = f
            .db
            .update_program(
                program.id,
                ProgramChanges::default(),
                Some(vec![NewSession {
                    trainer_id: f.trainer.id,
                    session_datetime: now() + Duration::hours(3),
                    duration_minutes: 30,
                    notes: None,
                    is_active: false,
                }]),
            )
            .await
            .unwrap();

        let err = enroll(&*f.db, &f.trainer, sessions[0].id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = enroll(&*f.db, &f.employee, sessions[0].id, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::BadRequest("Cannot enroll in inactive session".into())
        );

        let err = enroll(&*f.db, &f.employee, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("Session not found".into()));
    }

    #[tokio::test]
    async fn completed_enrollments_cannot_be_dropped() {
        let f = Fixture::new().await;
        let (program, sessions) = f
            .program(&f.manager, &[(&f.trainer, 1), (&f.trainer, 2)])
            .await;
        f.assign(&program, &f.employee).await;
        let done = f.enroll(&sessions[0], &f.employee).await;
        f.enroll(&sessions[1], &f.employee).await;
        mark_complete(&*f.db, &f.trainer, done.id, complete(None), now())
            .await
            .unwrap();

        let err = unenroll(&*f.db, &f.employee, sessions[0].id)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::BadRequest("Cannot unenroll from completed sessions".into())
        );

        unenroll(&*f.db, &f.employee, sessions[1].id).await.unwrap();
        assert!(f
            .db
            .find_enrollment(sessions[1].id, f.employee.id)
            .await
            .unwrap()
            .is_none());

        let err = unenroll(&*f.db, &f.employee, sessions[1].id)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("Enrollment not found".into()));
    }

    #[tokio::test]
    async fn completion_is_one_way_and_repeatable() {
        let f = Fixture::new().await;
        let (program, sessions) = f.program(&f.manager, &[(&f.trainer, 1)]).await;
        f.assign(&program, &f.employee).await;
        let enrollment = f.enroll(&sessions[0], &f.employee).await;

        for flag in [Some(false), None] {
            let input = MarkComplete {
                completed: flag,
                notes: None,
            };
            let err = mark_complete(&*f.db, &f.trainer, enrollment.id, input, now())
                .await
                .unwrap_err();
            assert_eq!(
                err,
                ServiceError::BadRequest(
                    "Can only mark enrollments as complete, not incomplete".into()
                )
            );
        }

        let first = mark_complete(&*f.db, &f.trainer, enrollment.id, complete(Some("great")), now())
            .await
            .unwrap();
        assert!(first.completed);
        assert_eq!(first.completion_date, Some(now()));
        assert_eq!(first.notes.as_deref(), Some("great"));

        let later = now() + Duration::hours(1);
        let second = mark_complete(&*f.db, &f.trainer, enrollment.id, complete(None), later)
            .await
            .unwrap();
        assert!(second.completed);
        assert_eq!(second.completion_date, Some(later));
        assert_eq!(second.notes.as_deref(), Some("great"));

        let err = mark_complete(&*f.db, &f.trainer, enrollment.id, MarkComplete::default(), later)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn only_the_session_trainer_completes() {
        let f = Fixture::new().await;
        let (program, sessions) = f.program(&f.manager, &[(&f.trainer, 1)]).await;
        f.assign(&program, &f.employee).await;
        let enrollment = f.enroll(&sessions[0], &f.employee).await;

        let err = mark_complete(&*f.db, &f.other_trainer, enrollment.id, complete(None), now())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden(FOREIGN_SESSION.into()));

        let err = mark_complete(&*f.db, &f.manager, enrollment.id, complete(None), now())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden(ONLY_TRAINERS_COMPLETE.into()));

        let err = complete_all(&*f.db, &f.other_trainer, sessions[0].id, None, now())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden(FOREIGN_SESSION.into()));
    }

    #[tokio::test]
    async fn complete_all_only_touches_incomplete_enrollments() {
        let f = Fixture::new().await;
        let (program, sessions) = f.program(&f.manager, &[(&f.trainer, 1)]).await;
        let empty = complete_all(&*f.db, &f.trainer, sessions[0].id, None, now())
            .await
            .unwrap();
        assert_eq!((empty.updated, empty.already_completed), (0, 0));

        f.assign(&program, &f.employee).await;
        f.assign(&program, &f.other_employee).await;
        let done = f.enroll(&sessions[0], &f.employee).await;
        f.enroll(&sessions[0], &f.other_employee).await;
        mark_complete(&*f.db, &f.trainer, done.id, complete(Some("early")), now())
            .await
            .unwrap();

        let later = now() + Duration::hours(2);
        let result = complete_all(&*f.db, &f.trainer, sessions[0].id, Some("batch".into()), later)
            .await
            .unwrap();
        assert_eq!((result.updated, result.already_completed), (1, 1));

        let untouched = f.db.get_enrollment(done.id).await.unwrap();
        assert_eq!(untouched.completion_date, Some(now()));
        assert_eq!(untouched.notes.as_deref(), Some("early"));

        let again = complete_all(&*f.db, &f.trainer, sessions[0].id, None, later)
            .await
            .unwrap();
        assert_eq!((again.updated, again.already_completed), (0, 2));
        assert_eq!(again.message, "All enrollments already completed");
    }
}
