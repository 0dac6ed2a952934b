//! The account table and queries for user identity records.
//!
//! An account starts out inactive when created through sign-up and only
//! becomes active once the emailed one-time passcode has been verified.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer account IDs.
///
/// This helps disambiguate account IDs from other types of IDs, leading to
/// better compile time errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountId(i64);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the account ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The account's ID in the application database.
    pub id: AccountId,
    /// The unique display/login name chosen by the user.
    pub username: String,
    /// The unique email address that one-time passcodes are sent to.
    pub email: String,
    /// The account's password hash.
    pub password_hash: PasswordHash,
    /// Whether the account has completed sign-up verification.
    ///
    /// Inactive accounts are placeholders awaiting their first successful
    /// OTP verification and cannot log in.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: OffsetDateTime,
}

/// Create the account table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new account into the database.
///
/// The uniqueness of `username` and `email` is enforced by the table
/// constraints, so two racing inserts for the same email leave exactly one
/// row behind.
///
/// # Errors
///
/// Returns [Error::AccountExists] or [Error::UsernameTaken] if a
/// uniqueness constraint failed, or [Error::SqlError] for other SQL
/// errors.
pub fn insert_account(
    username: &str,
    email: &str,
    password_hash: &PasswordHash,
    is_active: bool,
    connection: &Connection,
) -> Result<Account, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO account (username, email, password, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            username,
            email,
            password_hash.as_ref(),
            is_active,
            created_at,
        ),
    )?;

    Ok(Account {
        id: AccountId::new(connection.last_insert_rowid()),
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash: password_hash.clone(),
        is_active,
        created_at,
    })
}

fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;

    Ok(Account {
        id: AccountId::new(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const ACCOUNT_COLUMNS: &str = "id, username, email, password, is_active, created_at";

/// Get the account with an ID equal to `account_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `account_id` does not belong to a
/// registered account, or [Error::SqlError] if there was an error trying
/// to access the database.
pub fn get_account_by_id(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = :id"
        ))?
        .query_row(&[(":id", &account_id.as_i64())], |row| map_account_row(row))
        .map_err(|error| error.into())
}

/// Look up the account bound to `email`, if any.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub fn find_account_by_email(
    email: &str,
    connection: &Connection,
) -> Result<Option<Account>, Error> {
    match connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE email = :email"
        ))?
        .query_row(&[(":email", &email)], |row| map_account_row(row))
    {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Look up the account bound to `username`, if any.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub fn find_account_by_username(
    username: &str,
    connection: &Connection,
) -> Result<Option<Account>, Error> {
    match connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE username = :username"
        ))?
        .query_row(&[(":username", &username)], |row| map_account_row(row))
    {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Overwrite the username and password of an inactive placeholder account.
///
/// Used when someone re-submits the sign-up form for an email address
/// whose earlier sign-up never completed verification. The account stays
/// inactive.
///
/// # Errors
///
/// Returns [Error::NotFound] if `account_id` does not exist, or
/// [Error::UsernameTaken] if the new username collides with another
/// account.
pub fn overwrite_placeholder(
    account_id: AccountId,
    username: &str,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET username = ?1, password = ?2, is_active = 0 WHERE id = ?3",
        (username, password_hash.as_ref(), account_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Mark the account as active, completing sign-up.
///
/// # Errors
///
/// Returns [Error::NotFound] if `account_id` does not exist.
pub fn activate_account(account_id: AccountId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET is_active = 1 WHERE id = ?1",
        (account_id.as_i64(),),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Replace the account's password hash.
///
/// # Errors
///
/// Returns [Error::NotFound] if `account_id` does not exist.
pub fn set_password(
    account_id: AccountId,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), account_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Change the account's username.
///
/// The cooldown between username changes is checked by the caller, see
/// [crate::profile].
///
/// # Errors
///
/// Returns [Error::UsernameTaken] if the new username collides with
/// another account, or [Error::NotFound] if `account_id` does not exist.
pub fn set_username(
    account_id: AccountId,
    username: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET username = ?1 WHERE id = ?2",
        (username, account_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete an account row.
///
/// Only used to discard a freshly created placeholder when the sign-up
/// verification email could not be sent. Rows in dependent tables are
/// removed by their ON DELETE CASCADE constraints.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub fn delete_account(account_id: AccountId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM account WHERE id = ?1",
        (account_id.as_i64(),),
    )?;

    Ok(())
}
