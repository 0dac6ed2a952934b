//! The log-in page and handler.
//!
//! Logging in is passwordless: the user submits their email address and
//! receives a one-time passcode. No password is checked at this stage, so
//! the only failure the user can see is that no account exists for the
//! address.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error, Notifier,
    account::find_account_by_email,
    auth::{
        OtpPurpose, issue_otp,
        pending::{OtpFlow, PendingOtp, set_pending_otp},
    },
    endpoints,
    html::{auth_card, base, labeled_input, link, submit_button},
};

fn log_in_form(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::LOG_IN_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#email, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            (labeled_input("Email", "email", "email", email, "jane@example.com", error_message))

            (submit_button("Email me a code"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Don't have an account? "
                (link(endpoints::SIGN_UP_VIEW, "Sign up here"))
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Forgot your password? "
                (link(endpoints::FORGOT_PASSWORD_VIEW, "Reset it here"))
            }
        }
    }
}

/// Display the log-in page.
pub(crate) async fn get_log_in_page() -> Response {
    let form = log_in_form("", None);
    let content = auth_card("Log in to your account", &form);

    base("Log In", &[], &content).into_response()
}

/// The state needed to start a log-in.
#[derive(Clone)]
pub(crate) struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub(crate) cookie_key: Key,
    /// How long an emailed passcode stays valid.
    pub(crate) otp_expiry: Duration,
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
    /// Dispatches the log-in code email.
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            otp_expiry: state.otp_expiry,
            db_connection: state.db_connection.clone(),
            notifier: state.notifier.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered into the log-in form.
#[derive(Clone, Deserialize)]
pub(crate) struct LogInForm {
    /// The email address to send the code to.
    pub(crate) email: String,
}

/// Handler for log-in requests via the POST method.
///
/// On success a one-time passcode is emailed, the pending state is
/// recorded, and the client is redirected to the verify page. On failure
/// the form is returned with an error message and no state changes.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(form): Form<LogInForm>,
) -> Response {
    let email = form.email.trim();

    if email.is_empty() {
        return log_in_form(email, Some("Enter your email address")).into_response();
    }

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    let account = match find_account_by_email(email, &connection) {
        Ok(Some(account)) => account,
        Ok(None) => {
            return log_in_form(email, Some(&Error::AccountNotFound.to_string()))
                .into_response();
        }
        Err(error) => return error.into_response(),
    };

    if let Err(error) = issue_otp(
        &account,
        OtpPurpose::LogIn,
        state.otp_expiry,
        state.notifier.as_ref(),
        &connection,
    ) {
        tracing::error!("Could not send log-in code email: {error}");
        return log_in_form(
            email,
            Some("We could not send the email. Please try again."),
        )
        .into_response();
    }

    let jar = match set_pending_otp(
        jar,
        PendingOtp {
            account_id: account.id,
            flow: OtpFlow::LogIn,
        },
    ) {
        Ok(jar) => jar,
        Err(error) => return error.into_response(),
    };

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::VERIFY_VIEW.to_owned()),
        jar,
    )
        .into_response()
}

#[cfg(test)]
mod log_in_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Form, extract::State, http::StatusCode};
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use axum_htmx::HX_REDIRECT;
    use rusqlite::Connection;
    use sha2::{Digest, Sha512};

    use crate::{
        Notifier, PasswordHash,
        account::insert_account,
        auth::{most_recent_otp_for, otp::DEFAULT_OTP_EXPIRY},
        db::initialize,
        endpoints,
        test_utils::{
            FailingNotifier, RecordingNotifier, SentEmail, assert_fragment_has_error_message,
        },
    };

    use super::{LogInForm, LogInState, post_log_in};

    fn test_state(notifier: Arc<dyn Notifier>) -> (LogInState, Arc<Mutex<Connection>>) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let connection = Arc::new(Mutex::new(connection));
        let hash = Sha512::digest(b"foobar");

        (
            LogInState {
                cookie_key: Key::from(&hash),
                otp_expiry: DEFAULT_OTP_EXPIRY,
                db_connection: connection.clone(),
                notifier,
            },
            connection,
        )
    }

    async fn submit(state: LogInState, email: &str) -> axum::response::Response {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_log_in(
            State(state),
            jar,
            Form(LogInForm {
                email: email.to_owned(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn log_in_emails_code_and_redirects_to_verify() {
        let sent = Arc::new(Mutex::new(Vec::<SentEmail>::new()));
        let (state, connection) = test_state(Arc::new(RecordingNotifier::new(sent.clone())));
        let account = {
            let connection = connection.lock().unwrap();
            insert_account(
                "alice",
                "alice@example.com",
                &PasswordHash::new_unchecked("$2b$04$fakehash"),
                true,
                &connection,
            )
            .unwrap()
        };

        let response = submit(state, "alice@example.com").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(HX_REDIRECT).unwrap(),
            endpoints::VERIFY_VIEW
        );

        let emails = sent.lock().unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "login code");

        let connection = connection.lock().unwrap();
        assert!(
            most_recent_otp_for(account.id, &connection)
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn unknown_email_reports_account_not_found_without_creating_code() {
        let sent = Arc::new(Mutex::new(Vec::<SentEmail>::new()));
        let (state, connection) = test_state(Arc::new(RecordingNotifier::new(sent.clone())));

        let response = submit(state, "nobody@x.com").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fragment_has_error_message(response, "no account found").await;
        assert!(sent.lock().unwrap().is_empty());

        let connection = connection.lock().unwrap();
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM one_time_passcode", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn empty_email_is_rejected() {
        let (state, _) = test_state(Arc::new(FailingNotifier));

        let response = submit(state, "  ").await;

        assert_fragment_has_error_message(response, "Enter your email address").await;
    }

    #[tokio::test]
    async fn failed_dispatch_reports_error_and_stays_put() {
        let (state, connection) = test_state(Arc::new(FailingNotifier));
        let account = {
            let connection = connection.lock().unwrap();
            insert_account(
                "alice",
                "alice@example.com",
                &PasswordHash::new_unchecked("$2b$04$fakehash"),
                true,
                &connection,
            )
            .unwrap()
        };

        let response = submit(state, "alice@example.com").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fragment_has_error_message(response, "could not send the email").await;

        let connection = connection.lock().unwrap();
        assert_eq!(most_recent_otp_for(account.id, &connection).unwrap(), None);
    }
}
