//! Route handlers for listing, creating, editing and deleting accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    account::core::{
        Account, AccountData, AccountId, create_account, delete_account, get_account,
        get_accounts, update_account,
    },
    auth::AuthenticatedUser,
    db::lock_connection,
    endpoints::{self, format_endpoint},
};

/// The state needed to manage accounts.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the user's accounts with their balances.
pub async fn list_accounts_endpoint(
    State(state): State<AccountState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Account>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_accounts(user.id, &connection).map(Json)
}

/// Create an account, responding with `201 Created` and its location.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    user: AuthenticatedUser,
    Json(data): Json<AccountData>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let account = create_account(user.id, &data, &connection)?;
    tracing::debug!("User {} created account {}", user.id, account.id);

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format_endpoint(endpoints::ACCOUNT, account.id))],
        Json(account),
    ))
}

/// Get one of the user's accounts.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_account(user.id, account_id, &connection).map(Json)
}

/// Replace the name, description and initial balance of an account.
pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
    Json(data): Json<AccountData>,
) -> Result<Json<Account>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_account(user.id, account_id, &data, &connection).map(Json)
}

/// Delete an account and its transactions.
pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_account(user.id, account_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        account::core::Account,
        endpoints::{self, format_endpoint},
        test_utils::{assert_error, get_test_server, get_test_state, register_and_log_in},
    };

    #[tokio::test]
    async fn create_then_fetch_from_location() {
        let server = get_test_server(get_test_state());
        let token = register_and_log_in(&server, "alice@example.com", "Alice").await;

        let response = server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Everyday", "initial_balance": 250.0 }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let created: Account = response.json();
        let location = response.header("location");
        assert_eq!(
            location.to_str().unwrap(),
            format_endpoint(endpoints::ACCOUNT, created.id)
        );

        let fetched: Account = server
            .get(location.to_str().unwrap())
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(fetched, created);
        assert_eq!(fetched.balance, 250.0);
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let server = get_test_server(get_test_state());
        let token = register_and_log_in(&server, "alice@example.com", "Alice").await;
        server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Everyday" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Everyday" }))
            .await;

        assert_error(&response, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn accounts_are_private_to_their_owner() {
        let server = get_test_server(get_test_state());
        let alice = register_and_log_in(&server, "alice@example.com", "Alice").await;
        let bob = register_and_log_in(&server, "bob@example.com", "Bob").await;
        let account: Account = server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(&alice)
            .json(&json!({ "name": "Everyday" }))
            .await
            .json();
        let account_path = format_endpoint(endpoints::ACCOUNT, account.id);

        let accounts: Vec<Account> = server
            .get(endpoints::ACCOUNTS)
            .authorization_bearer(&bob)
            .await
            .json();
        assert!(accounts.is_empty());
        assert_error(
            &server.get(&account_path).authorization_bearer(&bob).await,
            StatusCode::NOT_FOUND,
        );
        assert_error(
            &server
                .put(&account_path)
                .authorization_bearer(&bob)
                .json(&json!({ "name": "Mine" }))
                .await,
            StatusCode::NOT_FOUND,
        );
        assert_error(
            &server.delete(&account_path).authorization_bearer(&bob).await,
            StatusCode::NOT_FOUND,
        );
    }

    #[tokio::test]
    async fn update_and_delete_account() {
        let server = get_test_server(get_test_state());
        let token = register_and_log_in(&server, "alice@example.com", "Alice").await;
        let account: Account = server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Everyday" }))
            .await
            .json();
        let account_path = format_endpoint(endpoints::ACCOUNT, account.id);

        let updated: Account = server
            .put(&account_path)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Daily", "description": "Debit card", "initial_balance": 5.0 }))
            .await
            .json();
        assert_eq!(updated.name, "Daily");
        assert_eq!(updated.balance, 5.0);

        server
            .delete(&account_path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&account_path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn accounts_require_authentication() {
        let server = get_test_server(get_test_state());

        assert_error(
            &server.get(endpoints::ACCOUNTS).await,
            StatusCode::UNAUTHORIZED,
        );
    }
}
