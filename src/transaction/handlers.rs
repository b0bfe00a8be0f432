//! Route handlers for recording, listing and correcting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    db::lock_connection,
    endpoints::{self, format_endpoint},
    transaction::core::{
        Transaction, TransactionData, TransactionFilter, TransactionId, create_transaction,
        delete_transaction, get_transaction, get_transactions, update_transaction,
    },
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the user's transactions, most recent first, narrowed down by the query string.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    user: AuthenticatedUser,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transactions(user.id, &filter, &connection).map(Json)
}

/// Record a transaction, responding with `201 Created` and its location.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthenticatedUser,
    Json(data): Json<TransactionData>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let transaction = create_transaction(user.id, &data, &connection)?;
    tracing::debug!(
        "User {} recorded {} transaction {}",
        user.id,
        transaction.kind.as_str(),
        transaction.id
    );

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format_endpoint(endpoints::TRANSACTION, transaction.id))],
        Json(transaction),
    ))
}

/// Get one of the user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthenticatedUser,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(user.id, transaction_id, &connection).map(Json)
}

/// Replace every field of a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthenticatedUser,
    Path(transaction_id): Path<TransactionId>,
    Json(data): Json<TransactionData>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_transaction(user.id, transaction_id, &data, &connection).map(Json)
}

pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthenticatedUser,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_transaction(user.id, transaction_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
