//! crates/training_den_core/src/users.rs
//!
//! The user directory: listing and lookup for every authenticated caller,
//! plus admin-only account management. Accounts are never hard-deleted.

use futures::try_join;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    AssignmentFilter, EnrollmentFilter, NewUser, ProgramFilter, Role, SessionFilter, User,
    UserChanges, UserFilter,
};
use crate::error::{ServiceError, ServiceResult};
use crate::guard::ensure_role;
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::views::{
    AssignedProgram, AssignedProgramRef, Deactivated, EnrolledSession, EnrolledSessionRef,
    LedSession, ManagedProgram, ProgramRef, RoleActivity, UserDetail, UserDisplay, UserOption,
};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email pattern"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Every user keyed by id, for attaching names to joined rows.
pub(crate) async fn user_index(db: &dyn DatabaseService) -> PortResult<HashMap<Uuid, User>> {
    Ok(db
        .list_users(&UserFilter::default())
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

fn parse_role(raw: &str) -> ServiceResult<Role> {
    raw.parse()
        .map_err(|_| ServiceError::bad_request("Invalid role"))
}

fn user_not_found(err: PortError) -> ServiceError {
    match err {
        PortError::NotFound(_) => ServiceError::not_found("User not found"),
        other => other.into(),
    }
}

/// Keeps only non-blank values.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

//=========================================================================================
// Inputs
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    /// Resets the password when non-blank.
    pub password: Option<String>,
}

//=========================================================================================
// Reads
//=========================================================================================

/// Users matching `filter`, ordered by role, then last name, then first name.
pub async fn list_users(
    db: &dyn DatabaseService,
    filter: &UserFilter,
) -> ServiceResult<Vec<UserDisplay>> {
    let mut users = db.list_users(filter).await?;
    users.sort_by(|a, b| {
        a.role
            .display_order()
            .cmp(&b.role.display_order())
            .then_with(|| a.last_name.cmp(&b.last_name))
            .then_with(|| a.first_name.cmp(&b.first_name))
    });
    Ok(users.into_iter().map(UserDisplay::from).collect())
}

/// Active users holding `role`, ordered by last name.
pub async fn users_by_role(db: &dyn DatabaseService, role: &str) -> ServiceResult<Vec<UserOption>> {
    let role = parse_role(role)?;
    let mut users = db
        .list_users(&UserFilter {
            role: Some(role),
            is_active: Some(true),
            search: None,
        })
        .await?;
    users.sort_by(|a, b| a.last_name.cmp(&b.last_name));
    Ok(users
        .into_iter()
        .map(|u| UserOption {
            id: u.id,
            full_name: u.full_name(),
            email: u.email,
            role: u.role,
        })
        .collect())
}

/// A user profile. Admin callers also receive the user's role-specific activity.
pub async fn user_detail(
    db: &dyn DatabaseService,
    caller: &User,
    user_id: Uuid,
) -> ServiceResult<UserDetail> {
    let user = db.get_user_by_id(user_id).await.map_err(user_not_found)?;
    let activity = if caller.is_admin() {
        role_activity(db, &user).await?
    } else {
        None
    };
    Ok(UserDetail { user, activity })
}

async fn role_activity(db: &dyn DatabaseService, user: &User) -> ServiceResult<Option<RoleActivity>> {
    match user.role {
        Role::Admin => Ok(None),
        Role::Manager => {
            let programs = db
                .list_programs(&ProgramFilter {
                    manager_id: Some(user.id),
                    active_only: true,
                    ..Default::default()
                })
                .await?;
            Ok(Some(RoleActivity::Manager {
                managed_programs: programs
                    .into_iter()
                    .map(|p| ManagedProgram {
                        id: p.id,
                        title: p.title,
                        deadline: p.deadline,
                        is_active: p.is_active,
                    })
                    .collect(),
            }))
        }
        Role::Trainer => {
            let sessions = db
                .list_sessions(&SessionFilter {
                    trainer_id: Some(user.id),
                    active_only: true,
                    ..Default::default()
                })
                .await?;
            let programs: HashMap<Uuid, ProgramRef> = db
                .list_programs(&ProgramFilter {
                    ids: Some(sessions.iter().map(|s| s.program_id).collect()),
                    ..Default::default()
                })
                .await?
                .iter()
                .map(|p| (p.id, ProgramRef::from(p)))
                .collect();
            Ok(Some(RoleActivity::Trainer {
                training_sessions: sessions
                    .into_iter()
                    .map(|s| LedSession {
                        id: s.id,
                        session_datetime: s.session_datetime,
                        duration_minutes: s.duration_minutes,
                        is_active: s.is_active,
                        program: programs.get(&s.program_id).cloned(),
                    })
                    .collect(),
            }))
        }
        Role::Employee => {
            let assignment_filter = AssignmentFilter {
                employee_id: Some(user.id),
                ..Default::default()
            };
            let enrollment_filter = EnrollmentFilter {
                employee_id: Some(user.id),
                ..Default::default()
            };
            let (assignments, enrollments) = try_join!(
                db.list_assignments(&assignment_filter),
                db.list_enrollments(&enrollment_filter),
            )?;
            let sessions = db
                .list_sessions(&SessionFilter {
                    ids: Some(enrollments.iter().map(|e| e.session_id).collect()),
                    ..Default::default()
                })
                .await?;
            let program_ids: HashSet<Uuid> = assignments
                .iter()
                .map(|a| a.program_id)
                .chain(sessions.iter().map(|s| s.program_id))
                .collect();
            let programs: HashMap<Uuid, _> = db
                .list_programs(&ProgramFilter {
                    ids: Some(program_ids.into_iter().collect()),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();
            let sessions: HashMap<Uuid, _> = sessions.into_iter().map(|s| (s.id, s)).collect();

            let assigned_programs = assignments
                .into_iter()
                .map(|a| AssignedProgram {
                    id: a.id,
                    created_at: a.created_at,
                    program: programs.get(&a.program_id).map(|p| AssignedProgramRef {
                        id: p.id,
                        title: p.title.clone(),
                        deadline: p.deadline,
                    }),
                })
                .collect();
            let enrolled_sessions = enrollments
                .into_iter()
                .map(|e| EnrolledSession {
                    id: e.id,
                    completed: e.completed,
                    completion_date: e.completion_date,
                    session: sessions.get(&e.session_id).map(|s| EnrolledSessionRef {
                        id: s.id,
                        session_datetime: s.session_datetime,
                        program: programs.get(&s.program_id).map(ProgramRef::from),
                    }),
                })
                .collect();
            Ok(Some(RoleActivity::Employee {
                assigned_programs,
                enrolled_sessions,
            }))
        }
    }
}

//=========================================================================================
// Admin Writes
//=========================================================================================

/// Creates an active account. `hash_password` turns the plain password into
/// the stored credential hash.
pub async fn create_user<F>(
    db: &dyn DatabaseService,
    caller: &User,
    input: CreateUser,
    hash_password: F,
) -> ServiceResult<User>
where
    F: FnOnce(&str) -> ServiceResult<String>,
{
    ensure_role(caller, &[Role::Admin])?;

    let (Some(email), Some(first_name), Some(last_name), Some(role), Some(password)) = (
        present(input.email),
        present(input.first_name),
        present(input.last_name),
        present(input.role),
        present(input.password),
    ) else {
        return Err(ServiceError::bad_request("Missing required fields"));
    };
    if !is_valid_email(&email) {
        return Err(ServiceError::bad_request("Invalid email format"));
    }
    let role = parse_role(&role)?;
    let hashed = hash_password(&password)?;

    let user = db
        .create_user_with_credentials(
            NewUser {
                email,
                first_name,
                last_name,
                role,
                phone: present(input.phone),
            },
            &hashed,
        )
        .await?;
    info!(user_id = %user.id, role = %user.role, caller = %caller.id, "User created");
    Ok(user)
}

pub async fn update_user<F>(
    db: &dyn DatabaseService,
    caller: &User,
    user_id: Uuid,
    input: UpdateUser,
    hash_password: F,
) -> ServiceResult<User>
where
    F: FnOnce(&str) -> ServiceResult<String>,
{
    ensure_role(caller, &[Role::Admin])?;

    let role = input.role.as_deref().map(parse_role).transpose()?;
    if user_id == caller.id {
        if role.is_some_and(|r| r != caller.role) {
            return Err(ServiceError::forbidden("Cannot change your own role"));
        }
        if input.is_active == Some(false) {
            return Err(ServiceError::forbidden("Cannot deactivate your own account"));
        }
    }
    if let Some(email) = &input.email {
        if !is_valid_email(email) {
            return Err(ServiceError::bad_request("Invalid email format"));
        }
    }
    let password_hash = present(input.password)
        .map(|p| hash_password(&p))
        .transpose()?;

    let changes = UserChanges {
        email: input.email,
        first_name: input.first_name,
        last_name: input.last_name,
        role,
        phone: input.phone,
        is_active: input.is_active,
        password_hash,
    };
    let user = db
        .update_user(user_id, changes)
        .await
        .map_err(user_not_found)?;
    info!(user_id = %user.id, caller = %caller.id, "User updated");
    Ok(user)
}

/// Soft delete: flips `is_active` off.
pub async fn deactivate_user(
    db: &dyn DatabaseService,
    caller: &User,
    user_id: Uuid,
) -> ServiceResult<Deactivated> {
    ensure_role(caller, &[Role::Admin])?;
    if user_id == caller.id {
        return Err(ServiceError::forbidden(
            "You cannot deactivate your own account",
        ));
    }
    let user = db
        .update_user(
            user_id,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .map_err(user_not_found)?;
    info!(user_id = %user.id, caller = %caller.id, "User deactivated");
    Ok(Deactivated {
        id: user.id,
        is_active: user.is_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{seed_user, Fixture};

    fn plain_hash(password: &str) -> ServiceResult<String> {
        Ok(format!("hashed:{}", password))
    }

    fn new_account(email: &str) -> CreateUser {
        CreateUser {
            email: Some(email.to_string()),
            first_name: Some("Nia".into()),
            last_name: Some("Newcomer".into()),
            role: Some("trainer".into()),
            phone: None,
            password: Some("hunter22".into()),
        }
    }

    #[test]
    fn email_pattern_requires_at_and_dot() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("plain"));
    }

    #[tokio::test]
    async fn listing_is_sorted_by_role_then_name() {
        let f = Fixture::new().await;
        seed_user(&f.db, Role::Manager, "Abe", "Manager").await;
        let users = list_users(&*f.db, &UserFilter::default()).await.unwrap();
        let order: Vec<(Role, &str)> = users
            .iter()
            .map(|u| (u.user.role, u.user.first_name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Role::Admin, "Ada"),
                (Role::Manager, "Abe"),
                (Role::Manager, "Mia"),
                (Role::Manager, "Otto"),
                (Role::Trainer, "Tom"),
                (Role::Trainer, "Tess"),
                (Role::Employee, "Eve"),
                (Role::Employee, "Finn"),
            ]
        );
        assert_eq!(users[0].full_name, "Ada Admin");
        assert_eq!(users[0].initials, "AA");
    }

    #[tokio::test]
    async fn listing_filters_by_search_and_activity() {
        let f = Fixture::new().await;
        f.deactivate(&f.other_employee).await;
        let found = list_users(
            &*f.db,
            &UserFilter {
                search: Some("FIELD".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user.id, f.other_employee.id);

        let active_employees = list_users(
            &*f.db,
            &UserFilter {
                role: Some(Role::Employee),
                is_active: Some(true),
                search: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(active_employees.len(), 1);
    }

    #[tokio::test]
    async fn by_role_rejects_unknown_roles() {
        let f = Fixture::new().await;
        let trainers = users_by_role(&*f.db, "trainer").await.unwrap();
        let names: Vec<_> = trainers.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["Tom Trainer", "Tess Tutor"]);

        let err = users_by_role(&*f.db, "wizard").await.unwrap_err();
        assert_eq!(err, ServiceError::BadRequest("Invalid role".into()));
    }

    #[tokio::test]
    async fn detail_adds_activity_only_for_admins() {
        let f = Fixture::new().await;
        let (program, sessions) = f.program(&f.manager, &[(&f.trainer, 2)]).await;
        f.assign(&program, &f.employee).await;
        f.enroll(&sessions[0], &f.employee).await;

        let plain = user_detail(&*f.db, &f.trainer, f.employee.id).await.unwrap();
        assert!(plain.activity.is_none());

        let detail = user_detail(&*f.db, &f.admin, f.employee.id).await.unwrap();
        match detail.activity {
            Some(RoleActivity::Employee {
                assigned_programs,
                enrolled_sessions,
            }) => {
                assert_eq!(assigned_programs.len(), 1);
                assert_eq!(enrolled_sessions.len(), 1);
                let session = enrolled_sessions[0].session.as_ref().unwrap();
                assert_eq!(session.program.as_ref().unwrap().title, "Fire Safety");
            }
            other => panic!("unexpected activity: {:?}", other),
        }

        let err = user_detail(&*f.db, &f.admin, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, ServiceError::NotFound("User not found".into()));
    }

    #[tokio::test]
    async fn create_validates_input_and_rejects_duplicates() {
        let f = Fixture::new().await;
        let err = create_user(&*f.db, &f.manager, new_account("x@y.io"), plain_hash)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let mut missing = new_account("x@y.io");
        missing.password = Some("  ".into());
        let err = create_user(&*f.db, &f.admin, missing, plain_hash)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::BadRequest("Missing required fields".into()));

        let err = create_user(&*f.db, &f.admin, new_account("not-an-email"), plain_hash)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::BadRequest("Invalid email format".into()));

        let user = create_user(&*f.db, &f.admin, new_account("nia@example.com"), plain_hash)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Trainer);
        assert!(user.is_active);
        let creds = f.db.get_credentials_by_email("nia@example.com").await.unwrap();
        assert_eq!(creds.hashed_password, "hashed:hunter22");

        let err = create_user(&*f.db, &f.admin, new_account("nia@example.com"), plain_hash)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn admins_cannot_demote_or_deactivate_themselves() {
        let f = Fixture::new().await;
        let demote = UpdateUser {
            role: Some("employee".into()),
            ..Default::default()
        };
        let err = update_user(&*f.db, &f.admin, f.admin.id, demote, plain_hash)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Forbidden("Cannot change your own role".into()));

        let disable = UpdateUser {
            is_active: Some(false),
            ..Default::default()
        };
        let err = update_user(&*f.db, &f.admin, f.admin.id, disable, plain_hash)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = deactivate_user(&*f.db, &f.admin, f.admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admin_can_promote_and_deactivate_others() {
        let f = Fixture::new().await;
        let promote = UpdateUser {
            role: Some("manager".into()),
            phone: Some("555-0100".into()),
            ..Default::default()
        };
        let user = update_user(&*f.db, &f.admin, f.employee.id, promote, plain_hash)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.phone.as_deref(), Some("555-0100"));

        let result = deactivate_user(&*f.db, &f.admin, f.employee.id)
            .await
            .unwrap();
        assert!(!result.is_active);
        assert!(!f.db.get_user_by_id(f.employee.id).await.unwrap().is_active);

        let err = deactivate_user(&*f.db, &f.admin, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("User not found".into()));
    }
}
