use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, database_id::DatabaseId, user::UserID};

pub type AccountId = DatabaseId;

/// A bank account, credit card or wallet that money moves in and out of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The name of the account, unique per user.
    pub name: String,
    /// Free text notes about the account.
    pub description: String,
    /// The balance before any of the recorded transactions.
    pub initial_balance: f64,
    /// The initial balance adjusted by every transaction into or out of the account.
    pub balance: f64,
    /// When the account was created.
    pub created_at: Date,
}

/// The fields a user provides to create or edit an account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountData {
    /// The account name.
    pub name: String,
    /// Notes about the account.
    #[serde(default)]
    pub description: String,
    /// The starting balance in dollars.
    #[serde(default)]
    pub initial_balance: f64,
}

impl AccountData {
    fn trimmed_name(&self) -> Result<&str, Error> {
        match self.name.trim() {
            "" => Err(Error::EmptyName),
            name => Ok(name),
        }
    }
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            initial_balance REAL NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, name)
        )",
        (),
    )?;

    Ok(())
}

/// Selects the account columns followed by the computed balance.
///
/// Transfers count against the source account and towards the destination account.
const SELECT_ACCOUNT: &str = "SELECT a.id, a.name, a.description, a.initial_balance, a.created_at,
        a.initial_balance
        + COALESCE((
            SELECT SUM(CASE t.kind WHEN 'income' THEN t.amount ELSE -t.amount END)
            FROM \"transaction\" t WHERE t.account_id = a.id
        ), 0)
        + COALESCE((
            SELECT SUM(t.amount)
            FROM \"transaction\" t WHERE t.to_account_id = a.id AND t.kind = 'transfer'
        ), 0)
    FROM account a";

fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        initial_balance: row.get(3)?,
        created_at: row.get(4)?,
        balance: row.get(5)?,
    })
}

fn map_unique_violation(error: rusqlite::Error, name: &str) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(sql_error, _)
            if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::DuplicateAccountName(name.to_owned())
        }
        error => error.into(),
    }
}

/// Create an account for `user_id`, dated today.
///
/// # Errors
/// Returns [Error::EmptyName] for a blank name, or
/// [Error::DuplicateAccountName] if the user already has an account with the name.
pub fn create_account(
    user_id: UserID,
    data: &AccountData,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = data.trimmed_name()?;
    let created_at = OffsetDateTime::now_utc().date();

    connection
        .execute(
            "INSERT INTO account (user_id, name, description, initial_balance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, name, data.description, data.initial_balance, created_at],
        )
        .map_err(|error| map_unique_violation(error, name))?;

    let id = connection.last_insert_rowid();

    Ok(Account {
        id,
        name: name.to_owned(),
        description: data.description.clone(),
        initial_balance: data.initial_balance,
        balance: data.initial_balance,
        created_at,
    })
}

/// Get one of the user's accounts.
///
/// # Errors
/// Returns [Error::NotFound] if `account_id` does not exist or belongs to another user.
pub fn get_account(
    user_id: UserID,
    account_id: AccountId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT} WHERE a.id = ?1 AND a.user_id = ?2"))?
        .query_row(params![account_id, user_id], map_row_to_account)
        .map_err(|error| error.into())
}

/// Get all of the user's accounts ordered by name.
pub fn get_accounts(user_id: UserID, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT} WHERE a.user_id = ?1 ORDER BY a.name ASC"))?
        .query_map(params![user_id], map_row_to_account)?
        .map(|account_result| account_result.map_err(Error::SqlError))
        .collect()
}

/// Whether `account_id` is one of the user's accounts.
pub fn account_belongs_to_user(
    user_id: UserID,
    account_id: AccountId,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM account WHERE id = ?1 AND user_id = ?2)",
            params![account_id, user_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Rename an account or change its description or initial balance.
///
/// # Errors
/// Returns [Error::NotFound] if the account is not the user's,
/// [Error::EmptyName] for a blank name, or [Error::DuplicateAccountName] if
/// another of the user's accounts has the name.
pub fn update_account(
    user_id: UserID,
    account_id: AccountId,
    data: &AccountData,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = data.trimmed_name()?;

    let rows_affected = connection
        .execute(
            "UPDATE account SET name = ?1, description = ?2, initial_balance = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![name, data.description, data.initial_balance, account_id, user_id],
        )
        .map_err(|error| map_unique_violation(error, name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_account(user_id, account_id, connection)
}

/// Delete an account along with every transaction into or out of it.
///
/// # Errors
/// Returns [Error::NotFound] if the account is not the user's.
pub fn delete_account(
    user_id: UserID,
    account_id: AccountId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM account WHERE id = ?1 AND user_id = ?2",
        params![account_id, user_id],
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}
