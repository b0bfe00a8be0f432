//! An admin view of the live sessions.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, State},
};
use serde::Serialize;

use crate::{AppState, Error, SessionManager, auth::identity::AuthenticatedUser};

/// The authority needed to see session statistics.
const ADMIN_AUTHORITY: &str = "ROLE_ADMIN";

/// The state needed for session statistics.
#[derive(Debug, Clone)]
pub struct SessionsState {
    /// The live sessions.
    pub session_manager: Arc<SessionManager>,
}

impl FromRef<AppState> for SessionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            session_manager: state.session_manager.clone(),
        }
    }
}

/// Counts of the sessions held in memory.
#[derive(Debug, Serialize)]
pub struct SessionStats {
    /// Sessions held in memory, including expired ones awaiting the next sweep.
    pub sessions: usize,
    /// The expiration window in seconds.
    pub expiration_secs: u64,
}

/// Report how many sessions are held. Only admins may call this.
pub async fn get_session_stats(
    State(state): State<SessionsState>,
    user: AuthenticatedUser,
) -> Result<Json<SessionStats>, Error> {
    if !user.has_authority(ADMIN_AUTHORITY) {
        tracing::warn!("User {} tried to read session stats", user.id);
        return Err(Error::Forbidden);
    }

    Ok(Json(SessionStats {
        sessions: state.session_manager.len(),
        expiration_secs: state.session_manager.expiration().as_secs(),
    }))
}
