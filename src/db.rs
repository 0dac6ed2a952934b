//! Database initialization.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error, account::create_account_table, auth::create_otp_table,
    profile::create_profile_table, transaction::create_transaction_table,
};

/// Create the tables for all of the application's domain models.
///
/// Foreign keys are switched on for the connection so that deleting an
/// account also removes its profile, passcodes and transactions.
///
/// # Errors
///
/// Returns an [Error::SqlError] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_account_table(&transaction)?;
    create_profile_table(&transaction)?;
    create_otp_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
