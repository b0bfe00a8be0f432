//! Route handlers for the current user's profile.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash, SessionManager,
    auth::{AuthenticatedUser, SessionToken},
    db::lock_connection,
    user::{
        UserProfile,
        core::{delete_user, get_user_by_id, update_password, update_user_name},
    },
};

/// The state needed to manage the current user.
#[derive(Debug, Clone)]
pub struct UserState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The sessions to end when a user is deleted.
    pub session_manager: Arc<SessionManager>,
    /// The bcrypt cost for new password hashes.
    pub password_cost: u32,
}

impl FromRef<AppState> for UserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            session_manager: state.session_manager.clone(),
            password_cost: state.password_cost,
        }
    }
}

/// The fields of a profile a user may change.
#[derive(Debug, Deserialize)]
pub struct UpdateUserData {
    /// The new display name.
    pub name: String,
}

/// The data for changing a password.
#[derive(Deserialize)]
pub struct ChangePasswordData {
    /// The password the user logs in with now.
    pub current_password: String,
    /// The password to log in with from now on.
    pub new_password: String,
}

/// Get the profile of the authenticated user.
pub async fn get_current_user(user: AuthenticatedUser) -> Json<UserProfile> {
    Json(user.profile())
}

/// Change the display name of the authenticated user.
pub async fn update_current_user(
    State(state): State<UserState>,
    user: AuthenticatedUser,
    Json(data): Json<UpdateUserData>,
) -> Result<Json<UserProfile>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let updated_user = update_user_name(user.id, &data.name, &connection)?;

    Ok(Json(UserProfile::from(&updated_user)))
}

/// Change the password of the authenticated user after checking their current password.
///
/// Existing tokens keep working.
pub async fn change_password(
    State(state): State<UserState>,
    user: AuthenticatedUser,
    Json(data): Json<ChangePasswordData>,
) -> Result<StatusCode, Error> {
    let stored_hash = {
        let connection = lock_connection(&state.db_connection)?;
        get_user_by_id(user.id, &connection)?.password_hash
    };

    if !stored_hash.verify(&data.current_password)? {
        return Err(Error::InvalidCredentials);
    }

    let new_hash = PasswordHash::from_raw_password(
        &data.new_password,
        &[&user.email, &user.name],
        state.password_cost,
    )?;

    let connection = lock_connection(&state.db_connection)?;
    update_password(user.id, &new_hash, &connection)?;
    tracing::info!("User {} changed their password", user.id);

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the authenticated user along with their accounts, categories,
/// periods and transactions, and end the session of the presented token.
///
/// Other tokens issued to the user are refused from the next request on,
/// since their subject no longer exists.
pub async fn delete_current_user(
    State(state): State<UserState>,
    user: AuthenticatedUser,
    SessionToken(token): SessionToken,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_user(user.id, &connection)?;
    state.session_manager.invalidate(&token);
    tracing::info!("Deleted user {}", user.id);

    Ok(StatusCode::NO_CONTENT)
}
