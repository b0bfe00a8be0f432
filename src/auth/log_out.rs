//! The endpoint for logging out.

use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
};

use crate::{
    AppState, SessionManager,
    auth::identity::{AuthenticatedUser, SessionToken},
};

/// The state needed for logging out.
#[derive(Debug, Clone)]
pub struct LogOutState {
    /// The sessions to remove the token from.
    pub session_manager: Arc<SessionManager>,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            session_manager: state.session_manager.clone(),
        }
    }
}

/// Invalidate the session of the presented bearer token.
///
/// The token itself stays correctly signed, but the filter treats it as
/// unauthenticated from now on.
pub async fn post_log_out(
    State(state): State<LogOutState>,
    user: AuthenticatedUser,
    SessionToken(token): SessionToken,
) -> StatusCode {
    state.session_manager.invalidate(&token);
    tracing::info!("User {} logged out", user.id);

    StatusCode::NO_CONTENT
}
