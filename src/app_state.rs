//! Implements a struct that holds the state of the server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Config, Error, Notifier, auth::DEFAULT_SESSION_DURATION, db::initialize,
    low_balance::LowBalancePolicy,
};

/// The state of the server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which the session cookie is valid.
    pub cookie_duration: Duration,

    /// How long an emailed one-time passcode stays valid.
    pub otp_expiry: Duration,

    /// When to send the low-balance warning email.
    pub low_balance: LowBalancePolicy,

    /// The local timezone as a canonical timezone name, e.g.
    /// "Pacific/Auckland".
    pub local_timezone: String,

    /// Where uploaded avatar images are written.
    pub avatar_dir: PathBuf,

    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,

    /// Dispatches outgoing email.
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables
    /// for the domain models.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        config: &Config,
        avatar_dir: PathBuf,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(&config.cookie_secret),
            cookie_duration: DEFAULT_SESSION_DURATION,
            otp_expiry: config.otp_expiry,
            low_balance: config.low_balance,
            local_timezone: config.local_timezone.clone(),
            avatar_dir,
            db_connection: Arc::new(Mutex::new(db_connection)),
            notifier,
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret` string.
pub(crate) fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
