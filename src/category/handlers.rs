//! Route handlers for listing, creating, editing and deleting categories.

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
    category::core::{
        Category, CategoryData, CategoryId, create_category, delete_category, get_categories,
        get_category, update_category,
    },
    db::lock_connection,
    endpoints::{self, format_endpoint},
};

/// The state needed to manage categories.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the user's categories.
pub async fn list_categories_endpoint(
    State(state): State<CategoryState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_categories(user.id, &connection).map(Json)
}

/// Create a category, responding with `201 Created` and its location.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    user: AuthenticatedUser,
    Json(data): Json<CategoryData>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let category = create_category(user.id, &data, &connection)?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, format_endpoint(endpoints::CATEGORY, category.id))],
        Json(category),
    ))
}

/// Get one of the user's categories.
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    user: AuthenticatedUser,
    Path(category_id): Path<CategoryId>,
) -> Result<Json<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_category(user.id, category_id, &connection).map(Json)
}

/// Replace the name and kind of a category.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    user: AuthenticatedUser,
    Path(category_id): Path<CategoryId>,
    Json(data): Json<CategoryData>,
) -> Result<Json<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_category(user.id, category_id, &data, &connection).map(Json)
}

/// Delete a category, leaving its transactions uncategorised.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    user: AuthenticatedUser,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_category(user.id, category_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
