//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{
    AuthConfig, Error, LoginLimiter, PasswordHash, SessionManager, TokenProvider, db::initialize,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// Signs and verifies bearer tokens.
    pub token_provider: Arc<TokenProvider>,

    /// The live token sessions.
    pub session_manager: Arc<SessionManager>,

    /// Failed log-in attempts per client IP.
    pub login_limiter: Arc<LoginLimiter>,

    /// The settings the auth services were built from.
    pub auth_config: AuthConfig,

    /// The bcrypt cost for hashing new passwords.
    pub password_cost: u32,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// A new token signing key is generated, so tokens from a previous run are rejected.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, auth_config: AuthConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let token_provider = TokenProvider::new(&auth_config.token_issuer);
        let session_manager = SessionManager::new(auth_config.session_expiration);
        let login_limiter = LoginLimiter::new(
            auth_config.max_login_attempts,
            auth_config.login_block_duration,
        );

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            token_provider: Arc::new(token_provider),
            session_manager: Arc::new(session_manager),
            login_limiter: Arc::new(login_limiter),
            auth_config,
            password_cost: PasswordHash::DEFAULT_COST,
        })
    }

    /// Use `cost` rounds of bcrypt for new password hashes.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth_config.clone()
    }
}
