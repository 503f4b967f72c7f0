//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use training_den_core::ports::DatabaseService;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// The `Set-Cookie` value that starts a browser session.
    pub fn session_cookie(&self, auth_session_id: &str) -> String {
        let max_age = chrono::Duration::days(self.config.session_ttl_days).num_seconds();
        format!(
            "session={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
            auth_session_id,
            if self.config.cookie_secure { " Secure;" } else { "" },
            max_age
        )
    }

    /// The `Set-Cookie` value that clears the browser session.
    pub fn cleared_cookie(&self) -> String {
        format!(
            "session=; HttpOnly;{} SameSite=Lax; Path=/; Max-Age=0",
            if self.config.cookie_secure { " Secure;" } else { "" },
        )
    }
}
