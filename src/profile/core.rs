//! The profile table and queries.
//!
//! Every account has exactly one profile. The profile row is inserted
//! explicitly by the same code path that inserts the account (sign-up and
//! the `create_account` CLI) rather than by a database trigger, so account
//! creation has no hidden side effects.

use rusqlite::{Connection, Row};
use time::{Duration, OffsetDateTime};

use crate::{Error, account::AccountId};

/// How long an account must wait between username changes.
pub(crate) const USERNAME_CHANGE_COOLDOWN: Duration = Duration::days(30);

/// Per-account display data, 1:1 with [crate::Account].
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// The account this profile belongs to.
    pub account_id: AccountId,
    /// The name shown on the profile page, may be empty.
    pub full_name: String,
    /// File name of the uploaded avatar under the media directory.
    ///
    /// `None` means the default avatar asset should be shown.
    pub avatar: Option<String>,
    /// When the username was last changed, `None` until the first change.
    pub last_username_change_at: Option<OffsetDateTime>,
}

impl Profile {
    /// The URL of the avatar image, falling back to the bundled default
    /// asset when no avatar has been uploaded.
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(file_name) => format!("{}/{file_name}", crate::endpoints::MEDIA),
            None => format!("{}/default-avatar.svg", crate::endpoints::STATIC),
        }
    }
}

/// Create the profile table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_profile_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS profile (
                account_id INTEGER PRIMARY KEY
                    REFERENCES account(id) ON DELETE CASCADE,
                full_name TEXT NOT NULL DEFAULT '',
                avatar TEXT,
                last_username_change_at TEXT
                )",
        (),
    )?;

    Ok(())
}

fn map_profile_row(row: &Row) -> Result<Profile, rusqlite::Error> {
    Ok(Profile {
        account_id: AccountId::new(row.get(0)?),
        full_name: row.get(1)?,
        avatar: row.get(2)?,
        last_username_change_at: row.get(3)?,
    })
}

/// Insert the profile row for a newly created account.
///
/// # Errors
///
/// Returns [Error::SqlError] if the account already has a profile or the
/// account does not exist.
pub fn insert_profile(
    account_id: AccountId,
    full_name: &str,
    connection: &Connection,
) -> Result<Profile, Error> {
    connection.execute(
        "INSERT INTO profile (account_id, full_name) VALUES (?1, ?2)",
        (account_id.as_i64(), full_name),
    )?;

    Ok(Profile {
        account_id,
        full_name: full_name.to_owned(),
        avatar: None,
        last_username_change_at: None,
    })
}

/// Get the profile for `account_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account has no profile row.
pub fn get_profile(account_id: AccountId, connection: &Connection) -> Result<Profile, Error> {
    connection
        .prepare(
            "SELECT account_id, full_name, avatar, last_username_change_at
             FROM profile WHERE account_id = :account_id",
        )?
        .query_row(&[(":account_id", &account_id.as_i64())], |row| {
            map_profile_row(row)
        })
        .map_err(|error| error.into())
}

/// Get the profile for `account_id`, inserting an empty one if the account
/// predates the profile table.
///
/// # Errors
///
/// Returns [Error::SqlError] if there was an error trying to access the
/// database.
pub fn get_or_create_profile(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Profile, Error> {
    match get_profile(account_id, connection) {
        Err(Error::NotFound) => insert_profile(account_id, "", connection),
        result => result,
    }
}

/// Set the display name on a profile.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account has no profile row.
pub fn set_full_name(
    account_id: AccountId,
    full_name: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE profile SET full_name = ?1 WHERE account_id = ?2",
        (full_name, account_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Set the avatar file name on a profile.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account has no profile row.
pub fn set_avatar(
    account_id: AccountId,
    file_name: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE profile SET avatar = ?1 WHERE account_id = ?2",
        (file_name, account_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Record that the username was changed at `changed_at`.
///
/// Only called when the username actually changed, so an edit that submits
/// the unchanged username does not start a new cooldown.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account has no profile row.
pub fn record_username_change(
    account_id: AccountId,
    changed_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE profile SET last_username_change_at = ?1 WHERE account_id = ?2",
        (changed_at, account_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Check whether the username may be changed at `now`.
///
/// # Errors
///
/// Returns [Error::UsernameCooldown] carrying the first allowed date when
/// the last change was less than [USERNAME_CHANGE_COOLDOWN] ago.
pub fn check_username_cooldown(profile: &Profile, now: OffsetDateTime) -> Result<(), Error> {
    match profile.last_username_change_at {
        Some(changed_at) if now - changed_at < USERNAME_CHANGE_COOLDOWN => {
            Err(Error::UsernameCooldown((changed_at + USERNAME_CHANGE_COOLDOWN).date()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod profile_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error, PasswordHash,
        account::{AccountId, insert_account},
        db::initialize,
    };

    use super::{
        USERNAME_CHANGE_COOLDOWN, check_username_cooldown, get_or_create_profile, get_profile,
        insert_profile, record_username_change, set_avatar, set_full_name,
    };

    fn get_db_with_account() -> (Connection, AccountId) {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        initialize(&conn).expect("Could not initialize database");
        let account = insert_account(
            "alice",
            "alice@example.com",
            &PasswordHash::new_unchecked("$2b$04$fakehash"),
            true,
            &conn,
        )
        .expect("Could not insert test account");

        (conn, account.id)
    }

    #[test]
    fn insert_and_get_profile_roundtrip() {
        let (conn, account_id) = get_db_with_account();

        let inserted = insert_profile(account_id, "Alice Doe", &conn).unwrap();
        let fetched = get_profile(account_id, &conn).unwrap();

        assert_eq!(inserted, fetched);
        assert_eq!(fetched.full_name, "Alice Doe");
        assert_eq!(fetched.avatar, None);
        assert_eq!(fetched.last_username_change_at, None);
    }

    #[test]
    fn get_profile_fails_without_row() {
        let (conn, account_id) = get_db_with_account();

        assert_eq!(get_profile(account_id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn get_or_create_inserts_missing_profile() {
        let (conn, account_id) = get_db_with_account();

        let profile = get_or_create_profile(account_id, &conn).unwrap();

        assert_eq!(profile.full_name, "");
        assert_eq!(get_profile(account_id, &conn).unwrap(), profile);
    }

    #[test]
    fn set_full_name_and_avatar_update_row() {
        let (conn, account_id) = get_db_with_account();
        insert_profile(account_id, "", &conn).unwrap();

        set_full_name(account_id, "Alice Doe", &conn).unwrap();
        set_avatar(account_id, "account_1.png", &conn).unwrap();

        let profile = get_profile(account_id, &conn).unwrap();
        assert_eq!(profile.full_name, "Alice Doe");
        assert_eq!(profile.avatar.as_deref(), Some("account_1.png"));
    }

    #[test]
    fn avatar_url_falls_back_to_default_asset() {
        let (conn, account_id) = get_db_with_account();
        let profile = insert_profile(account_id, "", &conn).unwrap();

        assert_eq!(profile.avatar_url(), "/static/default-avatar.svg");
    }

    #[test]
    fn cooldown_rejects_recent_change_with_allowed_date() {
        let (conn, account_id) = get_db_with_account();
        let mut profile = insert_profile(account_id, "", &conn).unwrap();
        let now = OffsetDateTime::now_utc();
        let changed_at = now - Duration::days(10);

        record_username_change(account_id, changed_at, &conn).unwrap();
        profile.last_username_change_at = Some(changed_at);

        let want_date = (changed_at + USERNAME_CHANGE_COOLDOWN).date();
        assert_eq!(
            check_username_cooldown(&profile, now),
            Err(Error::UsernameCooldown(want_date))
        );
    }

    #[test]
    fn cooldown_allows_change_after_thirty_days() {
        let (conn, account_id) = get_db_with_account();
        let mut profile = insert_profile(account_id, "", &conn).unwrap();
        let now = OffsetDateTime::now_utc();
        let changed_at = now - Duration::days(31);

        record_username_change(account_id, changed_at, &conn).unwrap();
        profile.last_username_change_at = Some(changed_at);

        assert_eq!(check_username_cooldown(&profile, now), Ok(()));
    }

    #[test]
    fn cooldown_allows_first_change() {
        let (conn, account_id) = get_db_with_account();
        let profile = insert_profile(account_id, "", &conn).unwrap();

        assert_eq!(
            check_username_cooldown(&profile, OffsetDateTime::now_utc()),
            Ok(())
        );
    }
}
