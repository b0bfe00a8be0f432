//! Route handlers for periods and their summaries.

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
    auth::AuthenticatedUser,
    db::lock_connection,
    endpoints::{self, format_endpoint},
    period::core::{
        Period, PeriodData, PeriodId, PeriodSummary, create_period, delete_period, get_period,
        get_periods, summarize_period, update_period,
    },
};

/// The state needed to manage periods.
#[derive(Debug, Clone)]
pub struct PeriodState {
    /// The database connection for managing periods.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for PeriodState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the user's periods.
pub async fn list_periods_endpoint(
    State(state): State<PeriodState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Period>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_periods(user.id, &connection).map(Json)
}

/// Create a period, responding with `201 Created` and its location.
pub async fn create_period_endpoint(
    State(state): State<PeriodState>,
    user: AuthenticatedUser,
    Json(data): Json<PeriodData>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let period = create_period(user.id, &data, &connection)?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format_endpoint(endpoints::PERIOD, period.id))],
        Json(period),
    ))
}

/// Get one of the user's periods.
pub async fn get_period_endpoint(
    State(state): State<PeriodState>,
    user: AuthenticatedUser,
    Path(period_id): Path<PeriodId>,
) -> Result<Json<Period>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_period(user.id, period_id, &connection).map(Json)
}

/// Replace the name and dates of a period.
pub async fn update_period_endpoint(
    State(state): State<PeriodState>,
    user: AuthenticatedUser,
    Path(period_id): Path<PeriodId>,
    Json(data): Json<PeriodData>,
) -> Result<Json<Period>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_period(user.id, period_id, &data, &connection).map(Json)
}

/// Delete a period.
pub async fn delete_period_endpoint(
    State(state): State<PeriodState>,
    user: AuthenticatedUser,
    Path(period_id): Path<PeriodId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_period(user.id, period_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Total the user's income and expenses within a period.
pub async fn get_period_summary_endpoint(
    State(state): State<PeriodState>,
    user: AuthenticatedUser,
    Path(period_id): Path<PeriodId>,
) -> Result<Json<PeriodSummary>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let period = get_period(user.id, period_id, &connection)?;

    summarize_period(user.id, &period, &connection).map(Json)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        period::core::{Period, PeriodSummary},
        test_utils::{assert_error, get_test_server, get_test_state, register_and_log_in},
    };

    #[tokio::test]
    async fn create_period_and_summarize_transactions() {
        let server = get_test_server(get_test_state());
        let token = register_and_log_in(&server, "alice@example.com", "Alice").await;
        let account: Value = server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Everyday" }))
            .await
            .json();
        for (kind, amount, date) in [
            ("income", 2000.0, "2025-03-01"),
            ("expense", 150.0, "2025-03-31"),
            ("expense", 75.0, "2025-04-01"),
        ] {
            server
                .post(endpoints::TRANSACTIONS)
                .authorization_bearer(&token)
                .json(&json!({
                    "kind": kind,
                    "amount": amount,
                    "date": date,
                    "account_id": account["id"],
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server
            .post(endpoints::PERIODS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "March", "start_date": "2025-03-01", "end_date": "2025-03-31" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let period: Period = response.json();

        let summary: PeriodSummary = server
            .get(&format_endpoint(endpoints::PERIOD_SUMMARY, period.id))
            .authorization_bearer(&token)
            .await
            .json();

        assert_eq!(
            summary,
            PeriodSummary {
                income: 2000.0,
                expense: 150.0,
                net: 1850.0,
                transaction_count: 2,
            }
        );
    }

    #[tokio::test]
    async fn backwards_period_is_bad_request() {
        let server = get_test_server(get_test_state());
        let token = register_and_log_in(&server, "alice@example.com", "Alice").await;

        let response = server
            .post(endpoints::PERIODS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Oops", "start_date": "2025-03-31", "end_date": "2025-03-01" }))
            .await;

        assert_error(&response, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_users_period_summary_is_not_found() {
        let server = get_test_server(get_test_state());
        let alice = register_and_log_in(&server, "alice@example.com", "Alice").await;
        let bob = register_and_log_in(&server, "bob@example.com", "Bob").await;
        let period: Period = server
            .post(endpoints::PERIODS)
            .authorization_bearer(&alice)
            .json(&json!({ "name": "March", "start_date": "2025-03-01", "end_date": "2025-03-31" }))
            .await
            .json();

        let response = server
            .get(&format_endpoint(endpoints::PERIOD_SUMMARY, period.id))
            .authorization_bearer(&bob)
            .await;

        assert_error(&response, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_and_delete_period() {
        let server = get_test_server(get_test_state());
        let token = register_and_log_in(&server, "alice@example.com", "Alice").await;
        let period: Period = server
            .post(endpoints::PERIODS)
            .authorization_bearer(&token)
            .json(&json!({ "name": "March", "start_date": "2025-03-01", "end_date": "2025-03-31" }))
            .await
            .json();
        let period_path = format_endpoint(endpoints::PERIOD, period.id);

        let updated: Period = server
            .put(&period_path)
            .authorization_bearer(&token)
            .json(&json!({ "name": "Q1", "start_date": "2025-01-01", "end_date": "2025-03-31" }))
            .await
            .json();
        assert_eq!(updated.name, "Q1");

        server
            .delete(&period_path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let periods: Vec<Period> = server
            .get(endpoints::PERIODS)
            .authorization_bearer(&token)
            .await
            .json();
        assert!(periods.is_empty());
    }
}
