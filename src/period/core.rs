//! Reporting periods and the totals of the transactions inside them.

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::DatabaseId, user::UserID};

pub type PeriodId = DatabaseId;

/// A named, inclusive date range such as "March 2025" or "Tax year 2024".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// The ID of the period.
    pub id: PeriodId,
    /// The display name of the period.
    pub name: String,
    /// The first day of the period.
    pub start_date: Date,
    /// The last day of the period.
    pub end_date: Date,
}

/// The fields a user provides to create or edit a period.
#[derive(Debug, Clone, Deserialize)]
pub struct PeriodData {
    /// The display name.
    pub name: String,
    /// The first day of the period.
    pub start_date: Date,
    /// The last day of the period, on or after `start_date`.
    pub end_date: Date,
}

impl PeriodData {
    fn validate(&self) -> Result<&str, Error> {
        let name = self.name.trim();

        if name.is_empty() {
            Err(Error::EmptyName)
        } else if self.start_date > self.end_date {
            Err(Error::InvalidPeriod)
        } else {
            Ok(name)
        }
    }
}

/// Income and expense totals over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// The sum of income transactions.
    pub income: f64,
    /// The sum of expense transactions.
    pub expense: f64,
    /// Income minus expenses.
    pub net: f64,
    /// The number of transactions in the period, transfers included.
    pub transaction_count: u64,
}

pub fn create_period_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS period (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            CHECK (start_date <= end_date)
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_period(row: &Row) -> Result<Period, rusqlite::Error> {
    Ok(Period {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
    })
}

/// Create a period for `user_id`.
///
/// # Errors
/// Returns [Error::EmptyName] for a blank name, or [Error::InvalidPeriod] if
/// the period ends before it starts.
pub fn create_period(
    user_id: UserID,
    data: &PeriodData,
    connection: &Connection,
) -> Result<Period, Error> {
    let name = data.validate()?;

    connection.execute(
        "INSERT INTO period (user_id, name, start_date, end_date) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, name, data.start_date, data.end_date],
    )?;

    Ok(Period {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
        start_date: data.start_date,
        end_date: data.end_date,
    })
}

/// Get one of the user's periods.
///
/// # Errors
/// Returns [Error::NotFound] if `period_id` does not exist or belongs to another user.
pub fn get_period(
    user_id: UserID,
    period_id: PeriodId,
    connection: &Connection,
) -> Result<Period, Error> {
    connection
        .prepare(
            "SELECT id, name, start_date, end_date FROM period WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row(params![period_id, user_id], map_row_to_period)
        .map_err(|error| error.into())
}

/// Get all of the user's periods, most recent first.
pub fn get_periods(user_id: UserID, connection: &Connection) -> Result<Vec<Period>, Error> {
    connection
        .prepare(
            "SELECT id, name, start_date, end_date FROM period WHERE user_id = ?1
             ORDER BY start_date DESC, id ASC",
        )?
        .query_map(params![user_id], map_row_to_period)?
        .map(|period_result| period_result.map_err(Error::SqlError))
        .collect()
}

/// Rename a period or move its dates.
///
/// # Errors
/// Returns [Error::NotFound] if the period is not the user's, or the same
/// validation errors as [create_period].
pub fn update_period(
    user_id: UserID,
    period_id: PeriodId,
    data: &PeriodData,
    connection: &Connection,
) -> Result<Period, Error> {
    let name = data.validate()?;

    let rows_affected = connection.execute(
        "UPDATE period SET name = ?1, start_date = ?2, end_date = ?3 WHERE id = ?4 AND user_id = ?5",
        params![name, data.start_date, data.end_date, period_id, user_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(Period {
        id: period_id,
        name: name.to_owned(),
        start_date: data.start_date,
        end_date: data.end_date,
    })
}

/// Delete a period. Transactions are not affected.
///
/// # Errors
/// Returns [Error::NotFound] if the period is not the user's.
pub fn delete_period(
    user_id: UserID,
    period_id: PeriodId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM period WHERE id = ?1 AND user_id = ?2",
        params![period_id, user_id],
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Total the user's transactions dated within `period`, both ends included.
pub fn summarize_period(
    user_id: UserID,
    period: &Period,
    connection: &Connection,
) -> Result<PeriodSummary, Error> {
    let (income, expense, transaction_count): (f64, f64, i64) = connection.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN kind = 'income' THEN amount END), 0),
            COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount END), 0),
            COUNT(*)
         FROM \"transaction\"
         WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3",
        params![user_id, period.start_date, period.end_date],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(PeriodSummary {
        income,
        expense,
        net: income - expense,
        transaction_count: u64::try_from(transaction_count).unwrap_or_default(),
    })
}
