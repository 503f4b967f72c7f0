pub mod assignments;
pub mod auth;
pub mod enrollments;
pub mod middleware;
pub mod programs;
pub mod response;
pub mod rest;
pub mod router;
pub mod state;
pub mod stats;
pub mod users;

// Re-export the router and middleware so the binary can assemble the server.
pub use middleware::require_auth;
pub use router::build_router;
