//! The passcode verification page and handler, shared by the log-in and
//! sign-up flows.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    account::{activate_account, get_account_by_id},
    auth::{
        cookie::set_auth_cookie,
        otp::consume_otp,
        pending::{OtpFlow, clear_pending_otp, get_pending_otp},
    },
    endpoints,
    html::{auth_card, base, form_error, labeled_input, link, submit_button},
};

fn verify_form(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        p class="text-sm font-light text-gray-500 dark:text-gray-400"
        {
            "We sent a 6-digit code to " b { (email) } ". Enter it below to continue."
        }

        form
            hx-post=(endpoints::VERIFY_API)
            hx-indicator="#indicator"
            hx-disabled-elt="#submit-button"
            class="space-y-4 md:space-y-6"
        {
            (labeled_input("Code", "code", "text", "", "123456", None))

            @if let Some(error_message) = error_message
            {
                (form_error(error_message))
            }

            (submit_button("Verify"))

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Didn't get a code? "
                (link(endpoints::LOG_IN_VIEW, "Request a new one"))
            }
        }
    }
}

fn verify_page(email: &str, error_message: Option<&str>) -> Markup {
    let form = verify_form(email, error_message);
    let content = auth_card("Check your email", &form);

    base("Verify", &[], &content)
}

/// The state needed to verify a passcode.
#[derive(Clone)]
pub(crate) struct VerifyState {
    /// The key to be used for signing and encrypting private cookies.
    pub(crate) cookie_key: Key,
    /// The duration for which the session cookie is valid.
    pub(crate) cookie_duration: Duration,
    /// How long an emailed passcode stays valid.
    pub(crate) otp_expiry: Duration,
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for VerifyState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            otp_expiry: state.otp_expiry,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<VerifyState> for Key {
    fn from_ref(state: &VerifyState) -> Self {
        state.cookie_key.clone()
    }
}

/// Display the verification page.
///
/// A client without a pending flow is sent back to the log-in page.
pub(crate) async fn get_verify_page(
    State(state): State<VerifyState>,
    jar: PrivateCookieJar,
) -> Response {
    let pending = match get_pending_otp(&jar) {
        Some(pending) => pending,
        None => return Redirect::to(endpoints::LOG_IN_VIEW).into_response(),
    };

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match get_account_by_id(pending.account_id, &connection) {
        Ok(account) => verify_page(&account.email, None).into_response(),
        Err(Error::NotFound) => Redirect::to(endpoints::LOG_IN_VIEW).into_response(),
        Err(error) => error.into_response(),
    }
}

/// The raw data entered into the verification form.
#[derive(Deserialize)]
pub(crate) struct VerifyForm {
    /// The submitted 6-digit code.
    pub(crate) code: String,
}

/// Handler for passcode submissions via the POST method.
///
/// On a match the passcode is consumed, the pending state is cleared, the
/// account is activated if this was a sign-up, and the session cookie is
/// set. A wrong code keeps the pending state so the user may retry.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn post_verify(
    State(state): State<VerifyState>,
    jar: PrivateCookieJar,
    Form(form): Form<VerifyForm>,
) -> Response {
    let pending = match get_pending_otp(&jar) {
        Some(pending) => pending,
        None => return Error::NoPendingFlow.into_response(),
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

    match consume_otp(
        pending.account_id,
        form.code.trim(),
        state.otp_expiry,
        &connection,
    ) {
        Ok(()) => {}
        Err(error @ (Error::InvalidOtp | Error::OtpExpired)) => {
            return verify_form(&account.email, Some(&error.to_string())).into_response();
        }
        Err(error) => return error.into_response(),
    }

    if pending.flow == OtpFlow::SignUp
        && !account.is_active
        && let Err(error) = activate_account(account.id, &connection)
    {
        return error.into_response();
    }

    let jar = clear_pending_otp(jar);
    let jar = match set_auth_cookie(jar, account.id, state.cookie_duration) {
        Ok(jar) => jar,
        Err(error) => return error.into_response(),
    };

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::DASHBOARD_VIEW.to_owned()),
        jar,
    )
        .into_response()
}

#[cfg(test)]
mod verify_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Form, extract::State, http::StatusCode};
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use axum_htmx::HX_REDIRECT;
    use rusqlite::Connection;
    use sha2::{Digest, Sha512};
    use time::OffsetDateTime;

    use crate::{
        PasswordHash,
        account::{Account, get_account_by_id, insert_account},
        auth::{
            COOKIE_SESSION, DEFAULT_SESSION_DURATION, OtpFlow, PendingOtp, most_recent_otp_for,
            otp::DEFAULT_OTP_EXPIRY,
            pending::{COOKIE_PENDING_OTP, get_pending_otp, set_pending_otp},
            store_otp,
        },
        db::initialize,
        endpoints,
        test_utils::assert_fragment_has_error_message,
    };

    use super::{VerifyForm, VerifyState, post_verify};

    fn test_state() -> (VerifyState, Arc<Mutex<Connection>>, Account) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let account = insert_account(
            "alice",
            "alice@example.com",
            &PasswordHash::new_unchecked("$2b$04$fakehash"),
            false,
            &connection,
        )
        .unwrap();
        let connection = Arc::new(Mutex::new(connection));
        let hash = Sha512::digest(b"foobar");

        (
            VerifyState {
                cookie_key: Key::from(&hash),
                cookie_duration: DEFAULT_SESSION_DURATION,
                otp_expiry: DEFAULT_OTP_EXPIRY,
                db_connection: connection.clone(),
            },
            connection,
            account,
        )
    }

    fn jar_with_pending(state: &VerifyState, account: &Account, flow: OtpFlow) -> PrivateCookieJar {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        set_pending_otp(
            jar,
            PendingOtp {
                account_id: account.id,
                flow,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn correct_code_authenticates_and_activates_signup() {
        let (state, connection, account) = test_state();
        {
            let connection = connection.lock().unwrap();
            store_otp(account.id, "123456", OffsetDateTime::now_utc(), &connection).unwrap();
        }
        let jar = jar_with_pending(&state, &account, OtpFlow::SignUp);

        let response = post_verify(
            State(state.clone()),
            jar,
            Form(VerifyForm {
                code: "123456".to_owned(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(HX_REDIRECT).unwrap(),
            endpoints::DASHBOARD_VIEW
        );

        let connection = connection.lock().unwrap();
        let account = get_account_by_id(account.id, &connection).unwrap();
        assert!(account.is_active, "sign-up verification should activate");
        assert_eq!(
            most_recent_otp_for(account.id, &connection).unwrap(),
            None,
            "the code should be single use"
        );

        // Both a session cookie and a cleared pending cookie are set.
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_owned())
            .collect();
        assert!(
            set_cookies
                .iter()
                .any(|cookie| cookie.starts_with(COOKIE_SESSION))
        );
        assert!(
            set_cookies
                .iter()
                .any(|cookie| cookie.starts_with(COOKIE_PENDING_OTP))
        );
    }

    #[tokio::test]
    async fn wrong_code_keeps_pending_state() {
        let (state, connection, account) = test_state();
        {
            let connection = connection.lock().unwrap();
            store_otp(account.id, "123456", OffsetDateTime::now_utc(), &connection).unwrap();
        }
        let jar = jar_with_pending(&state, &account, OtpFlow::LogIn);

        // The jar still holds the pending cookie after this call because
        // the handler only returns the form again.
        let response = post_verify(
            State(state.clone()),
            jar.clone(),
            Form(VerifyForm {
                code: "000000".to_owned(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fragment_has_error_message(response, "incorrect code").await;
        assert!(get_pending_otp(&jar).is_some());

        let connection = connection.lock().unwrap();
        assert!(
            most_recent_otp_for(account.id, &connection)
                .unwrap()
                .is_some(),
            "the code should survive a failed attempt"
        );
    }

    #[tokio::test]
    async fn expired_code_reports_expired() {
        let (state, connection, account) = test_state();
        {
            let connection = connection.lock().unwrap();
            let stale = OffsetDateTime::now_utc() - DEFAULT_OTP_EXPIRY - time::Duration::minutes(1);
            store_otp(account.id, "123456", stale, &connection).unwrap();
        }
        let jar = jar_with_pending(&state, &account, OtpFlow::LogIn);

        let response = post_verify(
            State(state),
            jar,
            Form(VerifyForm {
                code: "123456".to_owned(),
            }),
        )
        .await;

        assert_fragment_has_error_message(response, "the code has expired").await;
        let connection = connection.lock().unwrap();
        assert_eq!(most_recent_otp_for(account.id, &connection).unwrap(), None);
    }

    #[tokio::test]
    async fn submission_without_pending_flow_redirects_to_log_in() {
        let (state, _, _) = test_state();
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        let response = post_verify(
            State(state),
            jar,
            Form(VerifyForm {
                code: "123456".to_owned(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            endpoints::LOG_IN_VIEW
        );
    }
}
