//! Defines the core data models and database queries for transactions.

use std::str::FromStr;

use rusqlite::{
    Connection, Row, named_params, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    account::{AccountId, account_belongs_to_user},
    category::{CategoryId, CategoryKind, get_category},
    database_id::DatabaseId,
    period::{PeriodId, get_period},
    user::UserID,
};

pub type TransactionId = DatabaseId;

// ============================================================================
// MODELS
// ============================================================================

/// Which way money moved in a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money came into an account.
    Income,
    /// Money left an account.
    Expense,
    /// Money moved between two of the user's accounts.
    Transfer,
}

impl TransactionKind {
    /// The kind as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
        }
    }

    /// The kind of category this kind of transaction may have, if any.
    fn category_kind(&self) -> Option<CategoryKind> {
        match self {
            TransactionKind::Income => Some(CategoryKind::Income),
            TransactionKind::Expense => Some(CategoryKind::Expense),
            TransactionKind::Transfer => None,
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            "transfer" => Ok(TransactionKind::Transfer),
            other => Err(format!("unknown transaction kind \"{other}\"")),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// An income, expense or transfer between accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Which way the money moved.
    pub kind: TransactionKind,
    /// The amount of money moved, always positive.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The account money came into or left. For transfers, the source account.
    pub account_id: AccountId,
    /// The account a transfer moved money into.
    pub to_account_id: Option<AccountId>,
    /// The category of an income or expense.
    pub category_id: Option<CategoryId>,
}

/// The fields a user provides to create or edit a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionData {
    /// Which way the money moved.
    pub kind: TransactionKind,
    /// The amount, greater than zero.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// What the transaction was for.
    #[serde(default)]
    pub description: String,
    /// The account money came into or left, or the source of a transfer.
    pub account_id: AccountId,
    /// The destination of a transfer. Must be empty for income and expenses.
    #[serde(default)]
    pub to_account_id: Option<AccountId>,
    /// The category of an income or expense. Must be empty for transfers.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// Narrows down which transactions are listed. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    /// Transactions into or out of this account, transfers in either direction included.
    pub account_id: Option<AccountId>,
    /// Transactions in this category.
    pub category_id: Option<CategoryId>,
    /// Transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// Transactions on or after this date.
    pub from: Option<Date>,
    /// Transactions on or before this date.
    pub to: Option<Date>,
    /// Transactions within this period, on top of `from` and `to`.
    pub period_id: Option<PeriodId>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense', 'transfer')),
            amount REAL NOT NULL CHECK (amount > 0),
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            account_id INTEGER NOT NULL REFERENCES account(id) ON DELETE CASCADE,
            to_account_id INTEGER REFERENCES account(id) ON DELETE CASCADE,
            category_id INTEGER REFERENCES category(id) ON DELETE SET NULL,
            CHECK ((kind = 'transfer') = (to_account_id IS NOT NULL)),
            CHECK (kind != 'transfer' OR category_id IS NULL)
        )",
        (),
    )?;

    // Improve performance of the per-user date range queries used by listings and summaries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, kind, amount, date, description, account_id, to_account_id, category_id";

/// Map a database row to a [Transaction].
///
/// The row must have the columns in the order of `TRANSACTION_COLUMNS`.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: row.get(1)?,
        amount: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        account_id: row.get(5)?,
        to_account_id: row.get(6)?,
        category_id: row.get(7)?,
    })
}

/// Check the rules a transaction has to follow before it is stored.
///
/// # Errors
/// - [Error::InvalidAmount] if the amount is not greater than zero,
/// - [Error::InvalidAccount] if either account is not one of the user's,
/// - [Error::InvalidTransfer] if a transfer has no destination, moves money
///   into its own source, or has a category, or if an income or expense has
///   a destination account,
/// - [Error::InvalidCategory] if the category is not one of the user's or is
///   the wrong kind for the transaction.
pub fn validate_transaction(
    user_id: UserID,
    data: &TransactionData,
    connection: &Connection,
) -> Result<(), Error> {
    if !(data.amount.is_finite() && data.amount > 0.0) {
        return Err(Error::InvalidAmount(data.amount));
    }

    if !account_belongs_to_user(user_id, data.account_id, connection)? {
        return Err(Error::InvalidAccount(data.account_id));
    }

    match data.kind.category_kind() {
        None => {
            let to_account_id = data
                .to_account_id
                .ok_or(Error::InvalidTransfer("a transfer needs a destination account"))?;

            if to_account_id == data.account_id {
                return Err(Error::InvalidTransfer(
                    "cannot transfer money into the account it came from",
                ));
            }

            if !account_belongs_to_user(user_id, to_account_id, connection)? {
                return Err(Error::InvalidAccount(to_account_id));
            }

            if data.category_id.is_some() {
                return Err(Error::InvalidTransfer("transfers cannot have a category"));
            }
        }
        Some(wanted_category_kind) => {
            if data.to_account_id.is_some() {
                return Err(Error::InvalidTransfer(
                    "only transfers can have a destination account",
                ));
            }

            if let Some(category_id) = data.category_id {
                let category = match get_category(user_id, category_id, connection) {
                    Ok(category) => category,
                    Err(Error::NotFound) => return Err(Error::InvalidCategory(category_id)),
                    Err(error) => return Err(error),
                };

                if category.kind != wanted_category_kind {
                    return Err(Error::InvalidCategory(category_id));
                }
            }
        }
    }

    Ok(())
}

/// Validate and store a new transaction for `user_id`.
///
/// # Errors
/// Returns the errors of [validate_transaction], or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    data: &TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    validate_transaction(user_id, data, connection)?;

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\"
                (user_id, kind, amount, date, description, account_id, to_account_id, category_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            params![
                user_id,
                data.kind,
                data.amount,
                data.date,
                data.description,
                data.account_id,
                data.to_account_id,
                data.category_id,
            ],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve one of the user's transactions.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not exist or belongs to another user.
pub fn get_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row(params![id, user_id], map_transaction_row)
        .map_err(|error| error.into())
}

/// Get the user's transactions that match `filter`, most recent first.
///
/// # Errors
/// Returns [Error::NotFound] if the filter names a period that is not the user's.
pub fn get_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut from = filter.from;
    let mut to = filter.to;

    if let Some(period_id) = filter.period_id {
        let period = get_period(user_id, period_id, connection)?;
        from = Some(from.map_or(period.start_date, |from| from.max(period.start_date)));
        to = Some(to.map_or(period.end_date, |to| to.min(period.end_date)));
    }

    // Sort by date, and then ID to keep transaction order stable after updates
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = :user_id
                AND (:account_id IS NULL OR account_id = :account_id OR to_account_id = :account_id)
                AND (:category_id IS NULL OR category_id = :category_id)
                AND (:kind IS NULL OR kind = :kind)
                AND (:from IS NULL OR date >= :from)
                AND (:to IS NULL OR date <= :to)
             ORDER BY date DESC, id DESC"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id,
                ":account_id": filter.account_id,
                ":category_id": filter.category_id,
                ":kind": filter.kind,
                ":from": from,
                ":to": to,
            },
            map_transaction_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Validate and replace every field of one of the user's transactions.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction is not the user's, or the errors of [validate_transaction].
pub fn update_transaction(
    user_id: UserID,
    id: TransactionId,
    data: &TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    get_transaction(user_id, id, connection)?;
    validate_transaction(user_id, data, connection)?;

    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET kind = ?1, amount = ?2, date = ?3, description = ?4,
                account_id = ?5, to_account_id = ?6, category_id = ?7
             WHERE id = ?8 AND user_id = ?9
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            params![
                data.kind,
                data.amount,
                data.date,
                data.description,
                data.account_id,
                data.to_account_id,
                data.category_id,
                id,
                user_id,
            ],
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Delete one of the user's transactions.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction is not the user's.
pub fn delete_transaction(
    user_id: UserID,
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod validation_tests {
    use rusqlite::{Connection, params};
    use time::macros::date;

    use crate::{
        Error, PasswordHash,
        db::initialize,
        user::{Role, UserID, create_user},
    };

    use super::{TransactionData, TransactionKind, create_transaction, validate_transaction};

    struct Fixture {
        connection: Connection,
        alice: UserID,
        everyday: i64,
        savings: i64,
        bobs_account: i64,
        groceries: i64,
        salary: i64,
        bobs_category: i64,
    }

    fn insert_account(connection: &Connection, user_id: UserID, name: &str) -> i64 {
        connection
            .execute(
                "INSERT INTO account (user_id, name, initial_balance, created_at)
                 VALUES (?1, ?2, 0, '2025-01-01')",
                params![user_id, name],
            )
            .unwrap();
        connection.last_insert_rowid()
    }

    fn insert_category(connection: &Connection, user_id: UserID, name: &str, kind: &str) -> i64 {
        connection
            .execute(
                "INSERT INTO category (user_id, name, kind) VALUES (?1, ?2, ?3)",
                params![user_id, name, kind],
            )
            .unwrap();
        connection.last_insert_rowid()
    }

    fn fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let alice = create_user(
            "alice@example.com",
            "Alice",
            PasswordHash::new_unchecked("hunter2"),
            Role::User,
            &connection,
        )
        .unwrap()
        .id;
        let bob = create_user(
            "bob@example.com",
            "Bob",
            PasswordHash::new_unchecked("hunter3"),
            Role::User,
            &connection,
        )
        .unwrap()
        .id;

        Fixture {
            everyday: insert_account(&connection, alice, "Everyday"),
            savings: insert_account(&connection, alice, "Savings"),
            bobs_account: insert_account(&connection, bob, "Bob's"),
            groceries: insert_category(&connection, alice, "Groceries", "expense"),
            salary: insert_category(&connection, alice, "Salary", "income"),
            bobs_category: insert_category(&connection, bob, "Bob's", "expense"),
            connection,
            alice,
        }
    }

    fn expense(account_id: i64) -> TransactionData {
        TransactionData {
            kind: TransactionKind::Expense,
            amount: 12.5,
            date: date!(2025 - 03 - 14),
            description: "Pie".to_owned(),
            account_id,
            to_account_id: None,
            category_id: None,
        }
    }

    fn transfer(account_id: i64, to_account_id: i64) -> TransactionData {
        TransactionData {
            kind: TransactionKind::Transfer,
            to_account_id: Some(to_account_id),
            ..expense(account_id)
        }
    }

    #[test]
    fn valid_income_expense_and_transfer_pass() {
        let f = fixture();

        let income = TransactionData {
            kind: TransactionKind::Income,
            category_id: Some(f.salary),
            ..expense(f.everyday)
        };
        let expense_with_category = TransactionData {
            category_id: Some(f.groceries),
            ..expense(f.everyday)
        };

        assert_eq!(validate_transaction(f.alice, &income, &f.connection), Ok(()));
        assert_eq!(
            validate_transaction(f.alice, &expense_with_category, &f.connection),
            Ok(())
        );
        assert_eq!(
            validate_transaction(f.alice, &expense(f.everyday), &f.connection),
            Ok(())
        );
        assert_eq!(
            validate_transaction(f.alice, &transfer(f.everyday, f.savings), &f.connection),
            Ok(())
        );
    }

    #[test]
    fn amount_must_be_positive() {
        let f = fixture();

        for amount in [0.0, -5.0, f64::NAN] {
            let data = TransactionData {
                amount,
                ..expense(f.everyday)
            };

            let result = validate_transaction(f.alice, &data, &f.connection);

            assert!(
                matches!(result, Err(Error::InvalidAmount(_))),
                "want invalid amount for {amount}, got {result:?}"
            );
        }
    }

    #[test]
    fn accounts_must_belong_to_user() {
        let f = fixture();

        assert_eq!(
            validate_transaction(f.alice, &expense(f.bobs_account), &f.connection),
            Err(Error::InvalidAccount(f.bobs_account))
        );
        assert_eq!(
            validate_transaction(f.alice, &expense(9999), &f.connection),
            Err(Error::InvalidAccount(9999))
        );
        assert_eq!(
            validate_transaction(f.alice, &transfer(f.everyday, f.bobs_account), &f.connection),
            Err(Error::InvalidAccount(f.bobs_account))
        );
    }

    #[test]
    fn transfer_rules() {
        let f = fixture();
        let without_destination = TransactionData {
            to_account_id: None,
            ..transfer(f.everyday, f.savings)
        };
        let with_category = TransactionData {
            category_id: Some(f.groceries),
            ..transfer(f.everyday, f.savings)
        };

        assert!(matches!(
            validate_transaction(f.alice, &without_destination, &f.connection),
            Err(Error::InvalidTransfer(_))
        ));
        assert!(matches!(
            validate_transaction(f.alice, &transfer(f.everyday, f.everyday), &f.connection),
            Err(Error::InvalidTransfer(_))
        ));
        assert!(matches!(
            validate_transaction(f.alice, &with_category, &f.connection),
            Err(Error::InvalidTransfer(_))
        ));
    }

    #[test]
    fn expense_cannot_have_destination() {
        let f = fixture();
        let data = TransactionData {
            to_account_id: Some(f.savings),
            ..expense(f.everyday)
        };

        assert!(matches!(
            validate_transaction(f.alice, &data, &f.connection),
            Err(Error::InvalidTransfer(_))
        ));
    }

    #[test]
    fn category_must_belong_to_user_and_match_kind() {
        let f = fixture();
        let others_category = TransactionData {
            category_id: Some(f.bobs_category),
            ..expense(f.everyday)
        };
        let wrong_kind = TransactionData {
            category_id: Some(f.salary),
            ..expense(f.everyday)
        };

        assert_eq!(
            validate_transaction(f.alice, &others_category, &f.connection),
            Err(Error::InvalidCategory(f.bobs_category))
        );
        assert_eq!(
            validate_transaction(f.alice, &wrong_kind, &f.connection),
            Err(Error::InvalidCategory(f.salary))
        );
    }

    #[test]
    fn invalid_transaction_is_not_stored() {
        let f = fixture();
        let data = TransactionData {
            amount: -1.0,
            ..expense(f.everyday)
        };

        assert!(create_transaction(f.alice, &data, &f.connection).is_err());

        let count: i64 = f
            .connection
            .query_row("SELECT COUNT(*) FROM \"transaction\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
