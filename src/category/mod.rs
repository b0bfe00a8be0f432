//! Categories for grouping income and expenses.

mod core;
mod handlers;

pub use core::{CategoryId, CategoryKind, create_category_table, get_category};
pub use handlers::{
    create_category_endpoint, delete_category_endpoint, get_category_endpoint,
    list_categories_endpoint, update_category_endpoint,
};
