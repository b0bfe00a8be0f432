//! A REST API for managing personal finances.
//!
//! Users keep track of their accounts, categories, reporting periods and
//! transactions (income, expenses and transfers between accounts).
//! Requests are authenticated with signed bearer tokens whose lifetime is
//! tracked server side with a sliding expiration window.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod category;
mod config;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod password;
mod period;
mod routing;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{LoginLimiter, SessionManager, SessionSweeper, TokenProvider};
pub use config::AuthConfig;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{Role, User, UserID, get_user_by_email, normalize_email, update_password};

use crate::{account::AccountId, category::CategoryId};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for ctrl+c: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not listen for the terminate signal: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The bearer token has an invalid signature or issuer, or is malformed.
    #[error("invalid bearer token")]
    InvalidToken,

    /// The request needs an authenticated user but none was attached.
    #[error("authentication is required to access this resource")]
    Unauthenticated,

    /// The authenticated user lacks the authority needed for the resource.
    #[error("you do not have permission to access this resource")]
    Forbidden,

    /// The subject of a valid token no longer refers to a registered user.
    #[error("the user for this token no longer exists")]
    IdentityNotFound,

    /// Too many consecutive failed log-in attempts came from the client's IP
    /// address. Holds the time left before the client may try again.
    #[error("too many failed log-in attempts, try again in {} seconds", .0.as_secs().max(1))]
    IpBlocked(Duration),

    /// The client's IP address could not be determined.
    #[error("could not determine the client address")]
    MissingClientAddress,

    /// The email address is not valid.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address already belongs to a registered user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A signed token could not be created.
    #[error("could not issue token: {0}")]
    TokenIssueError(String),

    /// An empty string was used as a name.
    #[error("name cannot be empty")]
    EmptyName,

    /// The specified account name already exists for the user.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccountName(String),

    /// The specified category name already exists for the user.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// A transaction amount was zero, negative or not a number.
    ///
    /// The direction of money is given by the transaction kind, so amounts
    /// are always positive.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// The account ID does not refer to one of the user's accounts.
    #[error("the account ID {0} does not refer to a valid account")]
    InvalidAccount(AccountId),

    /// The category ID does not refer to one of the user's categories, or the
    /// category kind does not match the transaction kind.
    #[error("the category ID {0} does not refer to a valid category for this transaction")]
    InvalidCategory(CategoryId),

    /// The transaction breaks one of the rules for transfers.
    #[error("invalid transfer: {0}")]
    InvalidTransfer(&'static str),

    /// A period ends before it starts.
    #[error("a period cannot end before it starts")]
    InvalidPeriod,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials
            | Error::InvalidToken
            | Error::Unauthenticated
            | Error::IdentityNotFound
            | Error::IpBlocked(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail
            | Error::DuplicateAccountName(_)
            | Error::DuplicateCategoryName(_) => StatusCode::CONFLICT,
            Error::MissingClientAddress
            | Error::InvalidEmail(_)
            | Error::TooWeak(_)
            | Error::EmptyName
            | Error::InvalidAmount(_)
            | Error::InvalidAccount(_)
            | Error::InvalidCategory(_)
            | Error::InvalidTransfer(_)
            | Error::InvalidPeriod => StatusCode::BAD_REQUEST,
            Error::HashingError(_)
            | Error::TokenIssueError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // The details of internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use std::time::Duration;

    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, test_utils::parse_json_body};

    #[tokio::test]
    async fn ip_blocked_reports_remaining_seconds() {
        let response = Error::IpBlocked(Duration::from_secs(42)).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = parse_json_body(response).await;
        assert_eq!(
            body["error"],
            "too many failed log-in attempts, try again in 42 seconds"
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = Error::HashingError("bcrypt exploded".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = parse_json_body(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(
            !message.contains("bcrypt"),
            "internal error details leaked to client: {message}"
        );
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
