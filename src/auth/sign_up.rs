//! The sign-up page and handler.
//!
//! A successful sign-up creates an inactive account, emails a one-time
//! passcode, and sends the client to the verify page. The account only
//! becomes active once the passcode is verified.

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
    account::{
        Account, delete_account, find_account_by_email, find_account_by_username,
        get_account_by_id, insert_account, overwrite_placeholder,
    },
    auth::{
        OtpPurpose, issue_otp,
        pending::{OtpFlow, PendingOtp, set_pending_otp},
    },
    endpoints,
    html::{auth_card, base, form_error, labeled_input, link, password_input, submit_button},
    profile::{insert_profile, set_full_name},
};

/// Per-field error messages for the sign-up form.
#[derive(Default)]
struct SignUpErrors {
    full_name: Option<String>,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    confirm_password: Option<String>,
    general: Option<String>,
}

fn sign_up_form(form: &SignUpForm, errors: &SignUpErrors) -> Markup {
    html! {
        form
            hx-post=(endpoints::SIGN_UP_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (labeled_input("Full name", "full_name", "text", &form.full_name, "Jane Doe", errors.full_name.as_deref()))
            (labeled_input("Username", "username", "text", &form.username, "janedoe", errors.username.as_deref()))
            (labeled_input("Email", "email", "email", &form.email, "jane@example.com", errors.email.as_deref()))
            (password_input("password", "Password", errors.password.as_deref()))
            (password_input("confirm_password", "Confirm Password", errors.confirm_password.as_deref()))

            @if let Some(general) = &errors.general
            {
                (form_error(general))
            }

            (submit_button("Sign up"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Already have an account? "
                (link(endpoints::LOG_IN_VIEW, "Log in here"))
            }
        }
    }
}

/// Display the sign-up page.
pub(crate) async fn get_sign_up_page() -> Response {
    let form = sign_up_form(&SignUpForm::default(), &SignUpErrors::default());
    let content = auth_card("Create your account", &form);

    base("Sign Up", &[], &content).into_response()
}

/// The state needed to process a sign-up.
#[derive(Clone)]
pub(crate) struct SignUpState {
    /// The key to be used for signing and encrypting private cookies.
    pub(crate) cookie_key: Key,
    /// How long an emailed passcode stays valid.
    pub(crate) otp_expiry: Duration,
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
    /// Dispatches the verification email.
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl FromRef<AppState> for SignUpState {
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
impl FromRef<SignUpState> for Key {
    fn from_ref(state: &SignUpState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered into the sign-up form.
#[derive(Clone, Default, Deserialize)]
pub(crate) struct SignUpForm {
    /// The name shown on the profile page.
    pub(crate) full_name: String,
    /// The unique name to log in with.
    pub(crate) username: String,
    /// Where the verification code is sent.
    pub(crate) email: String,
    /// The password for the new account.
    pub(crate) password: String,
    /// Must match `password`.
    pub(crate) confirm_password: String,
}

fn error_response(form: &SignUpForm, errors: SignUpErrors) -> Response {
    let mut form = form.clone();
    form.password.clear();
    form.confirm_password.clear();

    sign_up_form(&form, &errors).into_response()
}

/// Handler for sign-up requests via the POST method.
///
/// Validation happens in a fixed order: required fields, password
/// confirmation, password strength, email availability, username
/// availability. An inactive placeholder account left behind by an
/// abandoned sign-up for the same email is overwritten instead of
/// rejected, so re-submitting the form is idempotent.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn post_sign_up(
    State(state): State<SignUpState>,
    jar: PrivateCookieJar,
    Form(form): Form<SignUpForm>,
) -> Response {
    let required_fields = [
        (&form.full_name, "full_name", "Enter your full name"),
        (&form.username, "username", "Choose a username"),
        (&form.email, "email", "Enter your email address"),
        (&form.password, "password", "Choose a password"),
        (
            &form.confirm_password,
            "confirm_password",
            "Repeat your password",
        ),
    ];
    for (value, field, message) in required_fields {
        if value.trim().is_empty() {
            let mut errors = SignUpErrors::default();
            let message = Some(message.to_string());
            match field {
                "full_name" => errors.full_name = message,
                "username" => errors.username = message,
                "email" => errors.email = message,
                "password" => errors.password = message,
                _ => errors.confirm_password = message,
            }
            return error_response(&form, errors);
        }
    }

    if form.password != form.confirm_password {
        return error_response(
            &form,
            SignUpErrors {
                confirm_password: Some(Error::PasswordMismatch.to_string()),
                ..Default::default()
            },
        );
    }

    let validated_password = match ValidatedPassword::new(&form.password) {
        Ok(password) => password,
        Err(error) => {
            return error_response(
                &form,
                SignUpErrors {
                    password: Some(error.to_string()),
                    ..Default::default()
                },
            );
        }
    };

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    let existing = match find_account_by_email(form.email.trim(), &connection) {
        Ok(existing) => existing,
        Err(error) => return error.into_response(),
    };

    if let Some(account) = &existing
        && account.is_active
    {
        return error_response(
            &form,
            SignUpErrors {
                email: Some(Error::AccountExists.to_string()),
                ..Default::default()
            },
        );
    }

    match find_account_by_username(form.username.trim(), &connection) {
        Ok(Some(other))
            if existing
                .as_ref()
                .map(|placeholder| placeholder.id)
                != Some(other.id) =>
        {
            return error_response(
                &form,
                SignUpErrors {
                    username: Some(Error::UsernameTaken.to_string()),
                    ..Default::default()
                },
            );
        }
        Ok(_) => {}
        Err(error) => return error.into_response(),
    }

    let password_hash = match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
        Ok(password_hash) => password_hash,
        Err(error) => return error.into_response(),
    };

    let (account, newly_created) =
        match create_or_overwrite_account(existing, &form, &password_hash, &connection) {
            Ok(result) => result,
            Err(error @ (Error::AccountExists | Error::UsernameTaken)) => {
                // Lost a race with a concurrent sign-up; report it the same
                // way as if the row had existed up front.
                let errors = if error == Error::AccountExists {
                    SignUpErrors {
                        email: Some(error.to_string()),
                        ..Default::default()
                    }
                } else {
                    SignUpErrors {
                        username: Some(error.to_string()),
                        ..Default::default()
                    }
                };
                return error_response(&form, errors);
            }
            Err(error) => return error.into_response(),
        };

    if let Err(error) = issue_otp(
        &account,
        OtpPurpose::SignUp,
        state.otp_expiry,
        state.notifier.as_ref(),
        &connection,
    ) {
        tracing::error!("Could not send sign-up verification email: {error}");

        // Roll back a freshly created account so an abandoned sign-up
        // leaves nothing behind; a reused placeholder is kept as-is.
        if newly_created && let Err(error) = delete_account(account.id, &connection) {
            tracing::error!("Could not roll back account after failed email: {error}");
        }

        return error_response(
            &form,
            SignUpErrors {
                general: Some("We could not send the verification email. Please try again.".to_owned()),
                ..Default::default()
            },
        );
    }

    let jar = match set_pending_otp(
        jar,
        PendingOtp {
            account_id: account.id,
            flow: OtpFlow::SignUp,
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

/// Reuse an inactive placeholder for this email or create a new inactive
/// account with its profile. Returns the account and whether it was newly
/// created.
fn create_or_overwrite_account(
    existing: Option<Account>,
    form: &SignUpForm,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(Account, bool), Error> {
    match existing {
        Some(placeholder) => {
            overwrite_placeholder(
                placeholder.id,
                form.username.trim(),
                password_hash,
                connection,
            )?;
            set_full_name(placeholder.id, form.full_name.trim(), connection)?;

            Ok((get_account_by_id(placeholder.id, connection)?, false))
        }
        None => {
            let account = insert_account(
                form.username.trim(),
                form.email.trim(),
                password_hash,
                false,
                connection,
            )?;
            insert_profile(account.id, form.full_name.trim(), connection)?;

            Ok((account, true))
        }
    }
}
