//! crates/training_den_core/src/fixtures.rs
//!
//! Seed data shared by the service tests.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use crate::domain::{
    NewAssignment, NewEnrollment, NewProgram, NewSession, NewUser, ProgramAssignment, Role,
    SessionEnrollment, TrainingProgram, TrainingSession, User, UserChanges,
};
use crate::memory::InMemoryStore;
use crate::ports::DatabaseService;

/// The reference instant every test measures "now" against.
pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub(crate) fn today() -> NaiveDate {
    now().date_naive()
}

pub(crate) struct Fixture {
    pub db: Arc<InMemoryStore>,
    pub admin: User,
    pub manager: User,
    pub other_manager: User,
    pub trainer: User,
    pub other_trainer: User,
    pub employee: User,
    pub other_employee: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = Arc::new(InMemoryStore::new());
        Self {
            admin: seed_user(&db, Role::Admin, "Ada", "Admin").await,
            manager: seed_user(&db, Role::Manager, "Mia", "Manager").await,
            other_manager: seed_user(&db, Role::Manager, "Otto", "Overseer").await,
            trainer: seed_user(&db, Role::Trainer, "Tom", "Trainer").await,
            other_trainer: seed_user(&db, Role::Trainer, "Tess", "Tutor").await,
            employee: seed_user(&db, Role::Employee, "Eve", "Employee").await,
            other_employee: seed_user(&db, Role::Employee, "Finn", "Fielder").await,
            db,
        }
    }

    /// A program owned by `manager` with one active session per entry, offset
    /// from `now()` by the given number of hours.
    pub async fn program(
        &self,
        manager: &User,
        sessions: &[(&User, i64)],
    ) -> (TrainingProgram, Vec<TrainingSession>) {
        let new_sessions = sessions
            .iter()
            .map(|(trainer, hours)| NewSession {
                trainer_id: trainer.id,
                session_datetime: now() + Duration::hours(*hours),
                duration_minutes: 60,
                notes: None,
                is_active: true,
            })
            .collect();
        self.db
            .create_program(
                NewProgram {
                    title: "Fire Safety".to_string(),
                    notes: None,
                    manager_id: manager.id,
                    deadline: today() + Duration::days(30),
                    is_active: true,
                },
                new_sessions,
            )
            .await
            .unwrap()
    }

    pub async fn assign(&self, program: &TrainingProgram, employee: &User) -> ProgramAssignment {
        self.db
            .create_assignments(vec![NewAssignment {
                program_id: program.id,
                employee_id: employee.id,
                assigned_by_manager_id: program.manager_id,
                notes: None,
            }])
            .await
            .unwrap()
            .remove(0)
    }

    pub async fn enroll(&self, session: &TrainingSession, employee: &User) -> SessionEnrollment {
        self.db
            .create_enrollment(NewEnrollment {
                session_id: session.id,
                employee_id: employee.id,
                notes: None,
            })
            .await
            .unwrap()
    }

    pub async fn deactivate(&self, user: &User) -> User {
        self.db
            .update_user(
                user.id,
                UserChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }
}

pub(crate) async fn seed_user(db: &InMemoryStore, role: Role, first: &str, last: &str) -> User {
    db.create_user_with_credentials(
        NewUser {
            email: format!("{}.{}@example.com", first, last).to_lowercase(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role,
            phone: None,
        },
        "not-a-real-hash",
    )
    .await
    .unwrap()
}
