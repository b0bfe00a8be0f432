use std::{net::SocketAddr, time::Duration};

use axum::extract::connect_info::MockConnectInfo;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, AuthConfig, PasswordHash, build_router, endpoints,
    user::{Role, User, create_user},
};

pub(crate) const TEST_PASSWORD: &str = "thisisaverysecurepassword!!!!";
pub(crate) const TEST_MAX_LOGIN_ATTEMPTS: u32 = 5;
pub(crate) const TEST_LOGIN_BLOCK: Duration = Duration::from_secs(900);

/// The address requests to [get_test_server] appear to come from.
pub(crate) fn test_peer_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

pub(crate) fn get_test_config() -> AuthConfig {
    AuthConfig::new(TEST_MAX_LOGIN_ATTEMPTS, TEST_LOGIN_BLOCK)
}

pub(crate) fn get_test_state_with_config(config: AuthConfig) -> AppState {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");

    AppState::new(connection, config)
        .expect("Could not create app state")
        .with_password_cost(4)
}

pub(crate) fn get_test_state() -> AppState {
    get_test_state_with_config(get_test_config())
}

pub(crate) fn insert_test_user(
    state: &AppState,
    email: &str,
    name: &str,
    password_hash: PasswordHash,
    role: Role,
) -> User {
    let connection = state.db_connection.lock().unwrap();
    create_user(email, name, password_hash, role, &connection).expect("Could not create test user")
}

/// A server for the full router, with every request coming from [test_peer_address].
pub(crate) fn get_test_server(state: AppState) -> TestServer {
    let app = build_router(state).layer(MockConnectInfo(test_peer_address()));

    TestServer::try_new(app).expect("Could not create test server.")
}

pub(crate) async fn register(server: &TestServer, email: &str, name: &str) -> Value {
    let response = server
        .post(endpoints::REGISTER)
        .json(&json!({ "email": email, "name": name, "password": TEST_PASSWORD }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    response.json()
}

pub(crate) async fn log_in(server: &TestServer, email: &str) -> String {
    let response = server
        .post(endpoints::LOG_IN)
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("Log-in response has no token")
        .to_owned()
}

/// Register a user and log them in, returning their bearer token.
pub(crate) async fn register_and_log_in(server: &TestServer, email: &str, name: &str) -> String {
    register(server, email, name).await;
    log_in(server, email).await
}
