//! Ledgerly is a small web app for tracking personal income and expenses.
//!
//! Users sign in with a one-time passcode sent to their email address,
//! record transactions, and see their balance broken down by payment
//! channel and spending category. This library serves HTML pages directly
//! over a REST-style API.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::response::{IntoResponse, Redirect, Response};
use axum_server::Handle;
use time::Date;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod config;
mod dashboard;
mod db;
mod endpoints;
mod html;
mod internal_server_error;
mod ledger;
mod logging;
mod low_balance;
mod navigation;
mod not_found;
mod notifier;
mod password;
mod profile;
mod routing;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use account::{Account, AccountId, insert_account};
pub use app_state::AppState;
pub use config::{Config, ConfigError};
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use low_balance::LowBalancePolicy;
pub use notifier::{Notifier, SmtpNotifier};
pub use password::{PasswordHash, ValidatedPassword};
pub use profile::insert_profile;
pub use routing::build_router;

use crate::internal_server_error::{
    InternalServerErrorPageTemplate, render_internal_server_error,
};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down
/// gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A required form field was missing or empty.
    ///
    /// The message names the offending field and is safe to show to the
    /// user.
    #[error("{0}")]
    Validation(String),

    /// The password and its confirmation did not match.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The user provided a password that is too easy to guess.
    ///
    /// The message comes from the password strength policy and explains
    /// how to pick a stronger password.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The email address is already bound to an active account.
    #[error("an account with this email already exists")]
    AccountExists,

    /// The username is already bound to a different account.
    #[error("this username is taken")]
    UsernameTaken,

    /// No account matches the given email address.
    #[error("no account found for this email address")]
    AccountNotFound,

    /// The one-time passcode has expired or was already used.
    ///
    /// The client should request a new code by restarting the flow.
    #[error("the code has expired, request a new one")]
    OtpExpired,

    /// The submitted one-time passcode does not match the issued one.
    ///
    /// The pending flow is preserved so the client may retry.
    #[error("incorrect code")]
    InvalidOtp,

    /// The outbound email could not be dispatched.
    ///
    /// The inner string should only be logged on the server; clients see
    /// a generic "try again" message.
    #[error("could not send email: {0}")]
    EmailSendFailed(String),

    /// An OTP or reset submission arrived without a matching pending
    /// flow in the session. The client should be redirected to the start
    /// of the flow rather than shown an error page.
    #[error("no pending verification flow")]
    NoPendingFlow,

    /// The username was changed less than the cooldown period ago.
    ///
    /// Carries the first date on which the username may be changed again.
    #[error("you can change your username again on {0}")]
    UsernameCooldown(Date),

    /// The requested resource was not found.
    ///
    /// Rows owned by another account intentionally produce this same
    /// error so their existence is not leaked.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Session or pending-flow state could not be serialized as JSON.
    #[error("could not serialize session state: {0}")]
    SerializationError(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the
    /// server, never shown to the client.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("account.email") =>
            {
                Error::AccountExists
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("account.username") =>
            {
                Error::UsernameTaken
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => not_found::get_404_not_found_response(),
            // State inconsistencies send the client back to the start of
            // the login flow instead of an error page.
            Error::NoPendingFlow => Redirect::to(endpoints::LOG_IN_VIEW).into_response(),
            Error::DatabaseLockError => render_internal_server_error(Default::default()),
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                render_internal_server_error(InternalServerErrorPageTemplate::default())
            }
        }
    }
}
