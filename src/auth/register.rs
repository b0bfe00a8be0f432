//! The endpoint for registering a new user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash,
    db::lock_connection,
    user::{Role, UserProfile, count_users, create_user, normalize_email},
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for adding users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The bcrypt cost for the new user's password hash.
    pub password_cost: u32,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            password_cost: state.password_cost,
        }
    }
}

/// The details of a new user.
#[derive(Deserialize)]
pub struct RegisterData {
    /// The email to log in with.
    pub email: String,
    /// The name to display for the user.
    pub name: String,
    /// The password in plain text.
    pub password: String,
}

/// A route handler for registering a new user.
///
/// The first user to register is made an admin, everyone after is a regular
/// user. Responds with the new user's profile and `201 Created`.
pub async fn register_user(
    State(state): State<RegistrationState>,
    Json(data): Json<RegisterData>,
) -> Result<impl IntoResponse, Error> {
    let email = normalize_email(&data.email)?;
    let name = data.name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    let password_hash =
        PasswordHash::from_raw_password(&data.password, &[&email, name], state.password_cost)?;

    let connection = lock_connection(&state.db_connection)?;

    let role = match count_users(&connection)? {
        0 => Role::Admin,
        _ => Role::User,
    };
    let user = create_user(&email, name, password_hash, role, &connection)?;
    tracing::info!("Registered user {} as {}", user.id, role.as_str());

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        endpoints,
        test_utils::{TEST_PASSWORD, assert_error, get_test_server, get_test_state, register},
        user::{Role, UserProfile, get_user_by_email},
    };

    #[tokio::test]
    async fn first_user_is_admin_and_later_users_are_not() {
        let server = get_test_server(get_test_state());

        let first: UserProfile =
            serde_json::from_value(register(&server, "alice@example.com", "Alice").await).unwrap();
        let second: UserProfile =
            serde_json::from_value(register(&server, "bob@example.com", "Bob").await).unwrap();

        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::User);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn stores_normalized_email_and_hashed_password() {
        let state = get_test_state();
        let server = get_test_server(state.clone());

        server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "  Alice@Example.com",
                "name": " Alice ",
                "password": TEST_PASSWORD,
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let connection = state.db_connection.lock().unwrap();
        let user = get_user_by_email("alice@example.com", &connection).unwrap();
        assert_eq!(user.name, "Alice");
        assert_ne!(user.password_hash.as_ref(), TEST_PASSWORD);
        assert_eq!(user.password_hash.verify(TEST_PASSWORD), Ok(true));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let server = get_test_server(get_test_state());
        register(&server, "alice@example.com", "Alice").await;

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "ALICE@example.com",
                "name": "Other Alice",
                "password": TEST_PASSWORD,
            }))
            .await;

        assert_error(&response, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let server = get_test_server(get_test_state());

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "email": "alice@example.com",
                "name": "Alice",
                "password": "password1234",
            }))
            .await;

        assert_error(&response, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_and_empty_name_are_rejected() {
        let server = get_test_server(get_test_state());

        let bad_email = server
            .post(endpoints::REGISTER)
            .json(&json!({ "email": "alice", "name": "Alice", "password": TEST_PASSWORD }))
            .await;
        let empty_name = server
            .post(endpoints::REGISTER)
            .json(&json!({ "email": "alice@example.com", "name": "  ", "password": TEST_PASSWORD }))
            .await;

        assert_error(&bad_email, StatusCode::BAD_REQUEST);
        assert_error(&empty_name, StatusCode::BAD_REQUEST);
    }
}
