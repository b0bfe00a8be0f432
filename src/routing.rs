//! Application router configuration with public and authenticated route definitions.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState, Error,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        list_accounts_endpoint, update_account_endpoint,
    },
    auth::{authenticate, get_session_stats, post_log_in, post_log_out, register_user},
    category::{
        create_category_endpoint, delete_category_endpoint, get_category_endpoint,
        list_categories_endpoint, update_category_endpoint,
    },
    endpoints,
    period::{
        create_period_endpoint, delete_period_endpoint, get_period_endpoint,
        get_period_summary_endpoint, list_periods_endpoint, update_period_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
    user::{change_password, delete_current_user, get_current_user, update_current_user},
};

/// Return a router with all the app's routes.
///
/// Every request passes through [authenticate]. Routes whose handlers take an
/// `AuthenticatedUser` reject requests that it could not identify.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in));

    let user_routes = Router::new()
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(
            endpoints::CURRENT_USER,
            get(get_current_user)
                .put(update_current_user)
                .delete(delete_current_user),
        )
        .route(endpoints::CURRENT_USER_PASSWORD, put(change_password))
        .route(endpoints::ADMIN_SESSIONS, get(get_session_stats));

    let finance_routes = Router::new()
        .route(
            endpoints::ACCOUNTS,
            get(list_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::PERIODS,
            get(list_periods_endpoint).post(create_period_endpoint),
        )
        .route(
            endpoints::PERIOD,
            get(get_period_endpoint)
                .put(update_period_endpoint)
                .delete(delete_period_endpoint),
        )
        .route(endpoints::PERIOD_SUMMARY, get(get_period_summary_endpoint))
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        );

    public_routes
        .merge(user_routes)
        .merge(finance_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
