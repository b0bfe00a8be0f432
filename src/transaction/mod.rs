//! Income, expenses and transfers between accounts.

mod core;
mod handlers;

pub use core::create_transaction_table;
pub use handlers::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    list_transactions_endpoint, update_transaction_endpoint,
};
