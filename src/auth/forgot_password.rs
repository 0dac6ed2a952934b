//! The password-reset flow: request a code, verify it, set a new password.
//!
//! The flow runs through three states tracked in the pending-reset cookie
//! and never grants a login session of its own; after committing a new
//! password the user still logs in through the normal OTP flow.

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
    AppState, Error, Notifier, PasswordHash, ValidatedPassword,
    account::{find_account_by_email, get_account_by_id, set_password},
    auth::{
        OtpPurpose,
        cookie::{session_account, set_auth_cookie},
        issue_otp,
        otp::consume_otp,
        pending::{PendingReset, clear_pending_reset, get_pending_reset, set_pending_reset},
    },
    endpoints,
    html::{auth_card, base, labeled_input, link, password_input, submit_button},
};

fn request_code_form(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        p class="text-sm font-light text-gray-500 dark:text-gray-400"
        {
            "Enter your email address and we will send you a code to reset your password."
        }

        form
            hx-post=(endpoints::FORGOT_PASSWORD_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#email, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            (labeled_input("Email", "email", "email", email, "jane@example.com", error_message))

            (submit_button("Email me a code"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Remembered it after all? "
                (link(endpoints::LOG_IN_VIEW, "Log in here"))
            }
        }
    }
}

fn verify_code_form(error_message: Option<&str>) -> Markup {
    html! {
        p class="text-sm font-light text-gray-500 dark:text-gray-400"
        {
            "We emailed you a 6-digit code. Enter it below to continue."
        }

        form
            hx-post=(endpoints::RESET_VERIFY_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#code, #submit-button"
            class="space-y-4 md:space-y-6"
        {
            (labeled_input("Code", "code", "text", "", "123456", error_message))

            (submit_button("Verify"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Didn't get a code? "
                (link(endpoints::FORGOT_PASSWORD_VIEW, "Request a new one"))
            }
        }
    }
}

fn new_password_form(
    password_error: Option<&str>,
    confirm_password_error: Option<&str>,
) -> Markup {
    html! {
        p class="text-sm font-light text-gray-500 dark:text-gray-400"
        {
            "Choose a new password for your account."
        }

        form
            hx-post=(endpoints::RESET_PASSWORD_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (password_input("password", "New Password", password_error))
            (password_input("confirm_password", "Confirm New Password", confirm_password_error))

            (submit_button("Set new password"))
        }
    }
}

/// The state needed for the password-reset flow.
#[derive(Clone)]
pub(crate) struct ResetState {
    /// The key to be used for signing and encrypting private cookies.
    pub(crate) cookie_key: Key,
    /// The duration for which the session cookie is valid.
    pub(crate) cookie_duration: Duration,
    /// How long an emailed passcode stays valid.
    pub(crate) otp_expiry: Duration,
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
    /// Dispatches the reset code email.
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl FromRef<AppState> for ResetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            otp_expiry: state.otp_expiry,
            db_connection: state.db_connection.clone(),
            notifier: state.notifier.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<ResetState> for Key {
    fn from_ref(state: &ResetState) -> Self {
        state.cookie_key.clone()
    }
}

/// Display the password-reset page.
///
/// The page shows whichever step the pending-reset cookie says the client
/// is at: request a code, enter the code, or choose a new password.
pub(crate) async fn get_forgot_password_page(jar: PrivateCookieJar) -> Response {
    let form = match get_pending_reset(&jar) {
        None => request_code_form("", None),
        Some(pending) if !pending.verified => verify_code_form(None),
        Some(_) => new_password_form(None, None),
    };
    let content = auth_card("Reset your password", &form);

    base("Forgot Password", &[], &content).into_response()
}

/// The raw data entered into the reset-request form.
#[derive(Deserialize)]
pub(crate) struct ForgotPasswordForm {
    /// The email address of the account to reset.
    pub(crate) email: String,
}

/// Handler for reset-request submissions via the POST method.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn post_forgot_password(
    State(state): State<ResetState>,
    jar: PrivateCookieJar,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = form.email.trim();

    if email.is_empty() {
        return request_code_form(email, Some("Enter your email address")).into_response();
    }

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    let account = match find_account_by_email(email, &connection) {
        Ok(Some(account)) => account,
        Ok(None) => {
            return request_code_form(email, Some(&Error::AccountNotFound.to_string()))
                .into_response();
        }
        Err(error) => return error.into_response(),
    };

    if let Err(error) = issue_otp(
        &account,
        OtpPurpose::PasswordReset,
        state.otp_expiry,
        state.notifier.as_ref(),
        &connection,
    ) {
        tracing::error!("Could not send password reset email: {error}");
        return request_code_form(
            email,
            Some("We could not send the email. Please try again."),
        )
        .into_response();
    }

    let jar = match set_pending_reset(
        jar,
        PendingReset {
            account_id: account.id,
            verified: false,
        },
    ) {
        Ok(jar) => jar,
        Err(error) => return error.into_response(),
    };

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::FORGOT_PASSWORD_VIEW.to_owned()),
        jar,
    )
        .into_response()
}

/// The raw data entered into the reset code form.
#[derive(Deserialize)]
pub(crate) struct ResetVerifyForm {
    /// The submitted 6-digit code.
    pub(crate) code: String,
}

/// Handler for reset-code submissions via the POST method.
///
/// On a match the code is consumed and the pending reset is marked as
/// verified. No login session is granted.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn post_reset_verify(
    State(state): State<ResetState>,
    jar: PrivateCookieJar,
    Form(form): Form<ResetVerifyForm>,
) -> Response {
    let pending = match get_pending_reset(&jar) {
        Some(pending) => pending,
        None => return Error::NoPendingFlow.into_response(),
    };

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match consume_otp(
        pending.account_id,
        form.code.trim(),
        state.otp_expiry,
        &connection,
    ) {
        Ok(()) => {}
        Err(error @ (Error::InvalidOtp | Error::OtpExpired)) => {
            return verify_code_form(Some(&error.to_string())).into_response();
        }
        Err(error) => return error.into_response(),
    }

    let jar = match set_pending_reset(
        jar,
        PendingReset {
            account_id: pending.account_id,
            verified: true,
        },
    ) {
        Ok(jar) => jar,
        Err(error) => return error.into_response(),
    };

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::FORGOT_PASSWORD_VIEW.to_owned()),
        jar,
    )
        .into_response()
}

/// The raw data entered into the new-password form.
#[derive(Deserialize)]
pub(crate) struct ResetPasswordForm {
    /// The new password.
    pub(crate) password: String,
    /// Must match `password`.
    pub(crate) confirm_password: String,
}

/// Handler for committing a new password via the POST method.
///
/// Requires a verified pending reset. On success the stored hash is
/// replaced and the client returns to the log-in page; the reset itself
/// never authenticates. If the client is already logged in as the same
/// account, that session's cookie is refreshed in place instead of being
/// invalidated.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn post_reset_password(
    State(state): State<ResetState>,
    jar: PrivateCookieJar,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let pending = match get_pending_reset(&jar) {
        Some(pending) if pending.verified => pending,
        _ => return Error::NoPendingFlow.into_response(),
    };

    if form.password != form.confirm_password {
        return new_password_form(None, Some(&Error::PasswordMismatch.to_string()))
            .into_response();
    }

    let validated_password = match ValidatedPassword::new(&form.password) {
        Ok(password) => password,
        Err(error) => return new_password_form(Some(&error.to_string()), None).into_response(),
    };

    let password_hash = match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
        Ok(password_hash) => password_hash,
        Err(error) => return error.into_response(),
    };

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    let account = match get_account_by_id(pending.account_id, &connection) {
        Ok(account) => account,
        Err(Error::NotFound) => return Error::NoPendingFlow.into_response(),
        Err(error) => return error.into_response(),
    };

    if let Err(error) = set_password(account.id, &password_hash, &connection) {
        return error.into_response();
    }

    let jar = clear_pending_reset(jar);

    // Changing the password from within a logged-in session keeps that
    // session alive; everyone else goes back through the log-in flow.
    let jar = if session_account(&jar) == Some(account.id) {
        match set_auth_cookie(jar, account.id, state.cookie_duration) {
            Ok(jar) => jar,
            Err(error) => return error.into_response(),
        }
    } else {
        jar
    };

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::LOG_IN_VIEW.to_owned()),
        jar,
    )
        .into_response()
}
