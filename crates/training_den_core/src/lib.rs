pub mod assignments;
pub mod domain;
pub mod enrollments;
pub mod error;
pub mod guard;
pub mod memory;
pub mod ports;
pub mod programs;
pub mod stats;
pub mod users;
pub mod views;

#[cfg(test)]
mod fixtures;

pub use domain::{
    ProgramAssignment, Role, SessionEnrollment, TrainingProgram, TrainingSession, User,
    UserCredentials, UserFilter,
};
pub use error::{ServiceError, ServiceResult};
pub use memory::InMemoryStore;
pub use ports::{DatabaseService, PortError, PortResult};
