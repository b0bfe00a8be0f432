//! The category model and its database queries.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, user::UserID};

pub type CategoryId = DatabaseId;

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// This function will return an error if `name` is empty or only whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        match name.trim() {
            "" => Err(Error::EmptyName),
            name => Ok(Self(name.to_owned())),
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a category groups money coming in or money going out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Salary, interest, gifts received.
    Income,
    /// Groceries, rent, transport.
    Expense,
}

impl CategoryKind {
    /// The kind as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(format!("unknown category kind \"{other}\"")),
        }
    }
}

impl ToSql for CategoryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A user defined grouping of transactions, e.g. "Groceries".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category, unique per user.
    pub name: CategoryName,
    /// Which kind of transaction the category applies to.
    pub kind: CategoryKind,
}

/// The fields a user provides to create or edit a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryData {
    /// The category name.
    pub name: String,
    /// Which kind of transaction the category applies to.
    pub kind: CategoryKind,
}

pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            UNIQUE(user_id, name)
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_category(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        kind: row.get(2)?,
    })
}

fn map_unique_violation(error: rusqlite::Error, name: &CategoryName) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(sql_error, _)
            if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::DuplicateCategoryName(name.to_string())
        }
        error => error.into(),
    }
}

/// Create a category for `user_id`.
///
/// # Errors
/// Returns [Error::EmptyName] for a blank name, or
/// [Error::DuplicateCategoryName] if the user already has a category with the name.
pub fn create_category(
    user_id: UserID,
    data: &CategoryData,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = CategoryName::new(&data.name)?;

    connection
        .execute(
            "INSERT INTO category (user_id, name, kind) VALUES (?1, ?2, ?3)",
            params![user_id, name.as_ref(), data.kind],
        )
        .map_err(|error| map_unique_violation(error, &name))?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        name,
        kind: data.kind,
    })
}

/// Get one of the user's categories.
///
/// # Errors
/// Returns [Error::NotFound] if `category_id` does not exist or belongs to another user.
pub fn get_category(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, kind FROM category WHERE id = ?1 AND user_id = ?2")?
        .query_row(params![category_id, user_id], map_row_to_category)
        .map_err(|error| error.into())
}

/// Get all of the user's categories ordered by name.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, kind FROM category WHERE user_id = ?1 ORDER BY name ASC")?
        .query_map(params![user_id], map_row_to_category)?
        .map(|category_result| category_result.map_err(Error::SqlError))
        .collect()
}

/// Whether any transaction is filed under the category.
fn category_has_transactions(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM \"transaction\" WHERE category_id = ?1)",
            params![category_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Rename a category or change its kind.
///
/// The kind of a category that has transactions is fixed, since their kinds
/// have to keep matching it.
///
/// # Errors
/// Returns [Error::NotFound] if the category is not the user's,
/// [Error::EmptyName] for a blank name, [Error::DuplicateCategoryName] if
/// another of the user's categories has the name, or [Error::InvalidCategory]
/// if the kind changes while transactions are filed under the category.
pub fn update_category(
    user_id: UserID,
    category_id: CategoryId,
    data: &CategoryData,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = CategoryName::new(&data.name)?;

    let current = get_category(user_id, category_id, connection)?;
    if current.kind != data.kind && category_has_transactions(category_id, connection)? {
        return Err(Error::InvalidCategory(category_id));
    }

    let rows_affected = connection
        .execute(
            "UPDATE category SET name = ?1, kind = ?2 WHERE id = ?3 AND user_id = ?4",
            params![name.as_ref(), data.kind, category_id, user_id],
        )
        .map_err(|error| map_unique_violation(error, &name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(Category {
        id: category_id,
        name,
        kind: data.kind,
    })
}

/// Delete a category. Its transactions are kept without a category.
///
/// # Errors
/// Returns [Error::NotFound] if the category is not the user's.
pub fn delete_category(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        params![category_id, user_id],
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod category_tests {
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash,
        db::initialize,
        user::{Role, UserID, create_user},
    };

    use super::{
        CategoryData, CategoryKind, CategoryName, create_category, delete_category,
        get_categories, get_category, update_category,
    };

    fn get_test_connection() -> (Connection, UserID, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let alice = create_user(
            "alice@example.com",
            "Alice",
            PasswordHash::new_unchecked("hunter2"),
            Role::User,
            &connection,
        )
        .unwrap();
        let bob = create_user(
            "bob@example.com",
            "Bob",
            PasswordHash::new_unchecked("hunter3"),
            Role::User,
            &connection,
        )
        .unwrap();

        (connection, alice.id, bob.id)
    }

    fn category_data(name: &str, kind: CategoryKind) -> CategoryData {
        CategoryData {
            name: name.to_owned(),
            kind,
        }
    }

    #[test]
    fn create_and_get_category() {
        let (connection, alice, _) = get_test_connection();

        let created = create_category(
            alice,
            &category_data("Groceries", CategoryKind::Expense),
            &connection,
        )
        .unwrap();

        assert_eq!(get_category(alice, created.id, &connection), Ok(created));
    }

    #[test]
    fn duplicate_name_fails_for_same_user_only() {
        let (connection, alice, bob) = get_test_connection();
        create_category(alice, &category_data("Salary", CategoryKind::Income), &connection)
            .unwrap();

        let duplicate = create_category(
            alice,
            &category_data("Salary", CategoryKind::Expense),
            &connection,
        );
        let other_user =
            create_category(bob, &category_data("Salary", CategoryKind::Income), &connection);

        assert_eq!(
            duplicate,
            Err(Error::DuplicateCategoryName("Salary".to_owned()))
        );
        assert!(other_user.is_ok());
    }

    #[test]
    fn get_categories_lists_only_own_categories_by_name() {
        let (connection, alice, bob) = get_test_connection();
        create_category(alice, &category_data("Rent", CategoryKind::Expense), &connection)
            .unwrap();
        create_category(alice, &category_data("Bonus", CategoryKind::Income), &connection)
            .unwrap();
        create_category(bob, &category_data("Fuel", CategoryKind::Expense), &connection).unwrap();

        let names: Vec<CategoryName> = get_categories(alice, &connection)
            .unwrap()
            .into_iter()
            .map(|category| category.name)
            .collect();

        assert_eq!(
            names,
            [
                CategoryName::new_unchecked("Bonus"),
                CategoryName::new_unchecked("Rent")
            ]
        );
    }

    #[test]
    fn update_category_changes_name_and_kind() {
        let (connection, alice, _) = get_test_connection();
        let category =
            create_category(alice, &category_data("Gifts", CategoryKind::Expense), &connection)
                .unwrap();

        let updated = update_category(
            alice,
            category.id,
            &category_data("Gifts received", CategoryKind::Income),
            &connection,
        )
        .unwrap();

        assert_eq!(get_category(alice, category.id, &connection), Ok(updated.clone()));
        assert_eq!(updated.kind, CategoryKind::Income);
    }

    #[test]
    fn other_users_categories_are_not_found() {
        let (connection, alice, bob) = get_test_connection();
        let category =
            create_category(alice, &category_data("Rent", CategoryKind::Expense), &connection)
                .unwrap();

        assert_eq!(get_category(bob, category.id, &connection), Err(Error::NotFound));
        assert_eq!(
            update_category(
                bob,
                category.id,
                &category_data("Mine", CategoryKind::Expense),
                &connection
            ),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_category(bob, category.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn kind_is_fixed_while_category_has_transactions() {
        let (connection, alice, _) = get_test_connection();
        let category = create_category(
            alice,
            &category_data("Groceries", CategoryKind::Expense),
            &connection,
        )
        .unwrap();
        connection
            .execute(
                "INSERT INTO account (user_id, name, initial_balance, created_at)
                 VALUES (?1, 'Everyday', 0, '2025-01-01')",
                (alice,),
            )
            .unwrap();
        let account_id = connection.last_insert_rowid();
        connection
            .execute(
                "INSERT INTO \"transaction\" (user_id, kind, amount, date, description, account_id, category_id)
                 VALUES (?1, 'expense', 42, '2025-01-02', 'Weekly shop', ?2, ?3)",
                (alice, account_id, category.id),
            )
            .unwrap();

        let change_kind = update_category(
            alice,
            category.id,
            &category_data("Groceries", CategoryKind::Income),
            &connection,
        );
        let rename = update_category(
            alice,
            category.id,
            &category_data("Food", CategoryKind::Expense),
            &connection,
        );

        assert_eq!(change_kind, Err(Error::InvalidCategory(category.id)));
        assert_eq!(rename.map(|category| category.name.to_string()), Ok("Food".to_owned()));
        let mismatched: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM \"transaction\" t JOIN category c ON t.category_id = c.id
                 WHERE t.kind != c.kind",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(mismatched, 0);
    }

    #[test]
    fn delete_category_keeps_transactions() {
        let (connection, alice, _) = get_test_connection();
        let category =
            create_category(alice, &category_data("Rent", CategoryKind::Expense), &connection)
                .unwrap();
        connection
            .execute(
                "INSERT INTO account (user_id, name, initial_balance, created_at)
                 VALUES (?1, 'Everyday', 0, '2025-01-01')",
                (alice,),
            )
            .unwrap();
        let account_id = connection.last_insert_rowid();
        connection
            .execute(
                "INSERT INTO \"transaction\" (user_id, kind, amount, date, description, account_id, category_id)
                 VALUES (?1, 'expense', 500, '2025-01-02', 'January rent', ?2, ?3)",
                (alice, account_id, category.id),
            )
            .unwrap();

        delete_category(alice, category.id, &connection).unwrap();

        let category_id: Option<i64> = connection
            .query_row("SELECT category_id FROM \"transaction\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(category_id, None);
    }
}
