//! The ledger entry table and queries.

use rusqlite::{Connection, Row};
use time::Date;

use crate::{
    Error,
    account::AccountId,
    transaction::models::{Category, Direction, PaymentChannel, Transaction, TransactionId},
};

/// The fields needed to record a new transaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewTransaction {
    /// The account recording the transaction.
    pub(crate) account_id: AccountId,
    /// Whether this is income or an expense.
    pub(crate) direction: Direction,
    /// The amount of money, must not be negative.
    pub(crate) amount: f64,
    /// The spending category.
    pub(crate) category: Category,
    /// How the money moved.
    pub(crate) channel: PaymentChannel,
    /// When the transaction happened.
    pub(crate) date: Date,
}

/// Create the ledger entry table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(crate) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entry (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL
                    REFERENCES account(id) ON DELETE CASCADE,
                direction TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                category TEXT NOT NULL,
                channel TEXT NOT NULL,
                date TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_entry_account_date
         ON ledger_entry(account_id, date)",
        (),
    )?;

    Ok(())
}

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        account_id: AccountId::new(row.get(1)?),
        direction: row.get(2)?,
        amount: row.get(3)?,
        category: row.get(4)?,
        channel: row.get(5)?,
        date: row.get(6)?,
    })
}

/// Insert a new ledger entry.
///
/// # Errors
///
/// Returns [Error::Validation] if the amount is negative, or
/// [Error::SqlError] if there was an error trying to access the database.
pub(crate) fn create_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if new_transaction.amount < 0.0 {
        return Err(Error::Validation(
            "the amount must not be negative".to_owned(),
        ));
    }

    connection.execute(
        "INSERT INTO ledger_entry (account_id, direction, amount, category, channel, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            new_transaction.account_id.as_i64(),
            new_transaction.direction,
            new_transaction.amount,
            new_transaction.category,
            new_transaction.channel,
            new_transaction.date,
        ),
    )?;

    Ok(Transaction {
        id: connection.last_insert_rowid(),
        account_id: new_transaction.account_id,
        direction: new_transaction.direction,
        amount: new_transaction.amount,
        category: new_transaction.category,
        channel: new_transaction.channel,
        date: new_transaction.date,
    })
}

/// Get the transactions recorded by `account_id`, newest first.
///
/// When `date_range` is given, only transactions whose date falls inside
/// the inclusive range are returned.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub(crate) fn get_transactions_for_account(
    account_id: AccountId,
    date_range: Option<(Date, Date)>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    const COLUMNS: &str = "id, account_id, direction, amount, category, channel, date";

    match date_range {
        Some((start, end)) => connection
            .prepare(&format!(
                "SELECT {COLUMNS} FROM ledger_entry
                 WHERE account_id = :account_id AND date BETWEEN :start AND :end
                 ORDER BY date DESC, id DESC"
            ))?
            .query_map(
                rusqlite::named_params! {
                    ":account_id": account_id.as_i64(),
                    ":start": start,
                    ":end": end,
                },
                |row| map_transaction_row(row),
            )?
            .map(|row| row.map_err(|error| error.into()))
            .collect(),
        None => connection
            .prepare(&format!(
                "SELECT {COLUMNS} FROM ledger_entry
                 WHERE account_id = :account_id
                 ORDER BY date DESC, id DESC"
            ))?
            .query_map(
                rusqlite::named_params! { ":account_id": account_id.as_i64() },
                |row| map_transaction_row(row),
            )?
            .map(|row| row.map_err(|error| error.into()))
            .collect(),
    }
}

/// Delete the transaction with `id`, but only if it is owned by
/// `account_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] both when the row does not exist and when it
/// belongs to another account, so the existence of other accounts' rows is
/// not leaked.
pub(crate) fn delete_transaction(
    id: TransactionId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM ledger_entry WHERE id = :id AND account_id = :account_id",
        rusqlite::named_params! { ":id": id, ":account_id": account_id.as_i64() },
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

#[cfg(test)]
mod transaction_core_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error, PasswordHash,
        account::{AccountId, insert_account},
        db::initialize,
        transaction::models::{Category, Direction, PaymentChannel},
    };

    use super::{
        NewTransaction, create_transaction, delete_transaction, get_transactions_for_account,
    };

    fn get_db_with_account() -> (Connection, AccountId) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let account = insert_account(
            "alice",
            "alice@example.com",
            &PasswordHash::new_unchecked("$2b$04$fakehash"),
            true,
            &conn,
        )
        .unwrap();

        (conn, account.id)
    }

    fn new_expense(account_id: AccountId, amount: f64, date: time::Date) -> NewTransaction {
        NewTransaction {
            account_id,
            direction: Direction::Expense,
            amount,
            category: Category::Food,
            channel: PaymentChannel::Cash,
            date,
        }
    }

    #[test]
    fn create_transaction_roundtrips() {
        let (conn, account_id) = get_db_with_account();

        let inserted =
            create_transaction(new_expense(account_id, 12.5, date!(2024 - 01 - 10)), &conn)
                .unwrap();

        let transactions = get_transactions_for_account(account_id, None, &conn).unwrap();
        assert_eq!(transactions, vec![inserted]);
    }

    #[test]
    fn create_transaction_rejects_negative_amount() {
        let (conn, account_id) = get_db_with_account();

        let result =
            create_transaction(new_expense(account_id, -1.0, date!(2024 - 01 - 10)), &conn);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn date_range_narrows_results_to_the_month() {
        let (conn, account_id) = get_db_with_account();
        let in_january =
            create_transaction(new_expense(account_id, 10.0, date!(2024 - 01 - 31)), &conn)
                .unwrap();
        create_transaction(new_expense(account_id, 20.0, date!(2024 - 02 - 01)), &conn).unwrap();

        let transactions = get_transactions_for_account(
            account_id,
            Some((date!(2024 - 01 - 01), date!(2024 - 01 - 31))),
            &conn,
        )
        .unwrap();

        assert_eq!(transactions, vec![in_january]);
    }

    #[test]
    fn transactions_are_scoped_to_the_account() {
        let (conn, account_id) = get_db_with_account();
        let other = insert_account(
            "bob",
            "bob@example.com",
            &PasswordHash::new_unchecked("$2b$04$fakehash"),
            true,
            &conn,
        )
        .unwrap();
        create_transaction(new_expense(other.id, 99.0, date!(2024 - 01 - 10)), &conn).unwrap();

        let transactions = get_transactions_for_account(account_id, None, &conn).unwrap();

        assert!(transactions.is_empty());
    }

    #[test]
    fn delete_succeeds_for_owner() {
        let (conn, account_id) = get_db_with_account();
        let transaction =
            create_transaction(new_expense(account_id, 10.0, date!(2024 - 01 - 10)), &conn)
                .unwrap();

        delete_transaction(transaction.id, account_id, &conn).unwrap();

        assert!(
            get_transactions_for_account(account_id, None, &conn)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn delete_fails_for_other_account_and_keeps_row() {
        let (conn, account_id) = get_db_with_account();
        let other = insert_account(
            "bob",
            "bob@example.com",
            &PasswordHash::new_unchecked("$2b$04$fakehash"),
            true,
            &conn,
        )
        .unwrap();
        let transaction =
            create_transaction(new_expense(account_id, 10.0, date!(2024 - 01 - 10)), &conn)
                .unwrap();

        let result = delete_transaction(transaction.id, other.id, &conn);

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(
            get_transactions_for_account(account_id, None, &conn).unwrap(),
            vec![transaction]
        );
    }

    #[test]
    fn delete_fails_for_missing_row() {
        let (conn, account_id) = get_db_with_account();

        assert_eq!(
            delete_transaction(42, account_id, &conn),
            Err(Error::NotFound)
        );
    }
}
