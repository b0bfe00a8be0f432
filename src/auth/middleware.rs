//! Middleware that authenticates requests from their bearer token.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error, SessionManager, TokenProvider,
    auth::identity::{AuthenticatedUser, SessionToken},
    db::lock_connection,
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The database connection for looking up the token's user.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Verifies the bearer token.
    pub token_provider: Arc<TokenProvider>,
    /// Decides whether the token's session is still active.
    pub session_manager: Arc<SessionManager>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            token_provider: state.token_provider.clone(),
            session_manager: state.session_manager.clone(),
        }
    }
}

fn identify(state: &AuthState, token: &str) -> Result<AuthenticatedUser, Error> {
    let connection = lock_connection(&state.db_connection)?;

    state.token_provider.parse_and_authenticate(token, &connection)
}

/// Middleware function that attaches the identity of the bearer token's user to the request.
///
/// Requests without a token, with a token whose session has expired, or with a
/// token that fails verification continue without an identity. Handlers that
/// take an [AuthenticatedUser] then reject them.
///
/// A verified token whose user has since been deleted ends the token's
/// session and gets a `401` response.
///
/// On success the token's session is extended and the request carries an
/// [AuthenticatedUser] and a [SessionToken] in its extensions. A session that
/// was ended while the token was being checked is not brought back.
pub async fn authenticate(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = TokenProvider::resolve(request.headers()) else {
        return next.run(request).await;
    };

    if state.session_manager.is_expired(&token) {
        tracing::debug!("Bearer token has no active session, continuing unauthenticated");
        state.session_manager.invalidate(&token);
        return next.run(request).await;
    }

    match identify(&state, &token) {
        Ok(user) => {
            if state.session_manager.refresh(&token) {
                request.extensions_mut().insert(user);
                request.extensions_mut().insert(SessionToken(token));
            } else {
                tracing::debug!("Session ended while authenticating, continuing unauthenticated");
            }
        }
        Err(Error::InvalidToken) => {
            tracing::warn!("Rejected an invalid bearer token, continuing unauthenticated");
            request.extensions_mut().remove::<AuthenticatedUser>();
            request.extensions_mut().remove::<SessionToken>();
        }
        Err(Error::IdentityNotFound) => {
            state.session_manager.invalidate(&token);
            return Error::IdentityNotFound.into_response();
        }
        Err(error) => return error.into_response(),
    }

    next.run(request).await
}
