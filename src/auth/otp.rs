//! The one-time passcode table and lifecycle.
//!
//! A passcode is valid from its creation until either the expiry window
//! passes or it is consumed by a successful verification, whichever comes
//! first. Issuing a new passcode does not invalidate earlier ones; they
//! age out individually.

use rand::Rng;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use crate::{Error, Notifier, account::Account, account::AccountId};

/// How long a passcode stays valid unless configured otherwise.
pub(crate) const DEFAULT_OTP_EXPIRY: Duration = Duration::minutes(10);

/// Which operation requested the passcode. Decides the email subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OtpPurpose {
    /// Completing a sign-up.
    SignUp,
    /// Completing a log-in.
    LogIn,
    /// Verifying a password reset.
    PasswordReset,
}

impl OtpPurpose {
    pub(crate) fn subject(self) -> &'static str {
        match self {
            OtpPurpose::SignUp => "verify account",
            OtpPurpose::LogIn => "login code",
            OtpPurpose::PasswordReset => "password reset",
        }
    }
}

/// A stored one-time passcode.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OtpRecord {
    /// The row ID.
    pub(crate) id: i64,
    /// The account the passcode was issued for.
    pub(crate) account_id: AccountId,
    /// The six-digit, zero-padded code.
    pub(crate) code: String,
    /// When the passcode was created.
    pub(crate) created_at: OffsetDateTime,
}

/// Create the one-time passcode table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(crate) fn create_otp_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS one_time_passcode (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL
                    REFERENCES account(id) ON DELETE CASCADE,
                code TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Generate a six-digit code, uniformly at random in [100000, 999999].
pub(crate) fn generate_otp_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..=999_999);

    format!("{code:06}")
}

/// Persist a new passcode for `account_id`.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub(crate) fn store_otp(
    account_id: AccountId,
    code: &str,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<OtpRecord, Error> {
    connection.execute(
        "INSERT INTO one_time_passcode (account_id, code, created_at) VALUES (?1, ?2, ?3)",
        (account_id.as_i64(), code, created_at),
    )?;

    Ok(OtpRecord {
        id: connection.last_insert_rowid(),
        account_id,
        code: code.to_owned(),
        created_at,
    })
}

/// The most recently created passcode for `account_id`, if any.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub(crate) fn most_recent_otp_for(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Option<OtpRecord>, Error> {
    match connection
        .prepare(
            "SELECT id, account_id, code, created_at FROM one_time_passcode
             WHERE account_id = :account_id
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )?
        .query_row(&[(":account_id", &account_id.as_i64())], |row| {
            Ok(OtpRecord {
                id: row.get(0)?,
                account_id: AccountId::new(row.get(1)?),
                code: row.get(2)?,
                created_at: row.get(3)?,
            })
        }) {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn delete_otp(id: i64, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM one_time_passcode WHERE id = ?1", (id,))?;

    Ok(())
}

/// Generate, persist and email a fresh passcode for `account`.
///
/// Safe to call repeatedly; every call creates a new code and earlier
/// codes keep their own expiry.
///
/// # Errors
///
/// Returns [Error::EmailSendFailed] if the notifier could not dispatch
/// the email. The freshly stored code is removed again in that case, so
/// a failed issue leaves no trace.
pub(crate) fn issue_otp(
    account: &Account,
    purpose: OtpPurpose,
    expiry: Duration,
    notifier: &dyn Notifier,
    connection: &Connection,
) -> Result<(), Error> {
    let code = generate_otp_code();
    let record = store_otp(account.id, &code, OffsetDateTime::now_utc(), connection)?;

    let body = format!(
        "Hi {},\n\nYour Ledgerly code is {code}. \
         It expires in {} minutes.\n\nIf you did not request this code, you can ignore this email.",
        account.username,
        expiry.whole_minutes(),
    );

    if let Err(error) = notifier.send(&account.email, purpose.subject(), &body) {
        delete_otp(record.id, connection)?;
        return Err(error);
    }

    Ok(())
}

/// Check `submitted_code` against the most recent passcode for
/// `account_id` and consume it on a match.
///
/// The delete is conditional on the code value, so of two concurrent
/// submissions of the correct code only the first can win; the second
/// observes the row gone and gets [Error::OtpExpired].
///
/// # Errors
///
/// - [Error::OtpExpired] when no passcode exists, the most recent one has
///   aged out (it is deleted as a side effect), or the passcode was
///   already consumed.
/// - [Error::InvalidOtp] when the submitted code does not match; the
///   stored passcode is kept so the caller may retry.
pub(crate) fn consume_otp(
    account_id: AccountId,
    submitted_code: &str,
    expiry: Duration,
    connection: &Connection,
) -> Result<(), Error> {
    let record = match most_recent_otp_for(account_id, connection)? {
        Some(record) => record,
        None => return Err(Error::OtpExpired),
    };

    if OffsetDateTime::now_utc() - record.created_at > expiry {
        delete_otp(record.id, connection)?;
        return Err(Error::OtpExpired);
    }

    // Compare-and-delete: the row is only removed if it still holds the
    // submitted code, making consumption single-use under concurrency.
    let rows_affected = connection.execute(
        "DELETE FROM one_time_passcode WHERE id = :id AND code = :code",
        rusqlite::named_params! { ":id": record.id, ":code": submitted_code },
    )?;

    if rows_affected == 1 {
        return Ok(());
    }

    if record.code == submitted_code {
        // The code was correct but someone else consumed it first.
        return Err(Error::OtpExpired);
    }

    Err(Error::InvalidOtp)
}
