//! Accounts that money moves in and out of, with balances computed from their transactions.

mod core;
mod handlers;

pub use core::{AccountId, account_belongs_to_user, create_account_table};
pub use handlers::{
    create_account_endpoint, delete_account_endpoint, get_account_endpoint,
    list_accounts_endpoint, update_account_endpoint,
};
