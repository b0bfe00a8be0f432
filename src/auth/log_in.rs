//! The log-in endpoint, which trades an email and password for a bearer token.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, LoginLimiter, SessionManager, TokenProvider,
    auth::client_ip::ClientIp,
    db::lock_connection,
    user::{User, UserProfile, get_user_by_email, normalize_email},
};

/// The state needed to log in a user.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The database connection for checking credentials.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Issues the token for a successful log-in.
    pub token_provider: Arc<TokenProvider>,
    /// Starts the session for the issued token.
    pub session_manager: Arc<SessionManager>,
    /// Tracks failed log-in attempts per client IP.
    pub login_limiter: Arc<LoginLimiter>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            token_provider: state.token_provider.clone(),
            session_manager: state.session_manager.clone(),
            login_limiter: state.login_limiter.clone(),
        }
    }
}

/// The credentials for logging in.
#[derive(Clone, Deserialize)]
pub struct LogInData {
    /// The user's email.
    pub email: String,
    /// The user's password in plain text.
    pub password: String,
}

/// The bearer token issued for a successful log-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogInResponse {
    /// The bearer token to send in the `Authorization` header.
    pub token: String,
    /// Always "Bearer".
    pub token_type: String,
    /// How many seconds the token may sit unused before it stops working.
    pub expires_in: u64,
    /// The user the token was issued to.
    pub user: UserProfile,
}

/// Check `credentials` against the user table.
///
/// Unknown emails and wrong passwords both give [Error::InvalidCredentials].
fn verify_credentials(credentials: &LogInData, connection: &Connection) -> Result<User, Error> {
    let email = normalize_email(&credentials.email).map_err(|_| Error::InvalidCredentials)?;

    let user = match get_user_by_email(&email, connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    if user.password_hash.verify(&credentials.password)? {
        Ok(user)
    } else {
        Err(Error::InvalidCredentials)
    }
}

/// Handler for log-in requests.
///
/// Clients whose IP address is blocked get [Error::IpBlocked] before their
/// credentials are looked at. Otherwise a failed log-in counts against the
/// client's IP address, and a successful one clears the count, issues a token
/// and starts its session.
pub async fn post_log_in(
    State(state): State<LoginState>,
    ClientIp(ip): ClientIp,
    Json(credentials): Json<LogInData>,
) -> Result<Json<LogInResponse>, Error> {
    if let Some(remaining) = state.login_limiter.remaining_block(ip) {
        tracing::warn!("Refused log-in from blocked address {ip}");
        return Err(Error::IpBlocked(remaining));
    }

    let verification = {
        let connection = lock_connection(&state.db_connection)?;

        verify_credentials(&credentials, &connection)
    };

    let user = match verification {
        Ok(user) => user,
        Err(Error::InvalidCredentials) => {
            let failures = state.login_limiter.record_failure(ip);
            tracing::info!("Failed log-in from {ip} ({failures} in a row)");
            return Err(Error::InvalidCredentials);
        }
        Err(error) => return Err(error),
    };

    state.login_limiter.record_success(ip);

    let token = state.token_provider.issue(&user)?;
    state.session_manager.touch(&token);
    tracing::info!("User {} logged in", user.id);

    Ok(Json(LogInResponse {
        token,
        token_type: "Bearer".to_owned(),
        expires_in: state.session_manager.expiration().as_secs(),
        user: UserProfile::from(&user),
    }))
}
