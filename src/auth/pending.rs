//! Pending-flow state, tracked per browser session in private cookies.
//!
//! Two independent pieces of state exist: "an OTP is outstanding for
//! account X as part of a log-in or sign-up", and "a password reset is
//! underway for account X and has (not) been verified". Keeping them in
//! separate cookies means a password-reset verification can never be
//! mistaken for a log-in.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};

use crate::{Error, account::AccountId};

pub(crate) const COOKIE_PENDING_OTP: &str = "pending_otp";
pub(crate) const COOKIE_PENDING_RESET: &str = "pending_reset";

/// Pending cookies outlive the longest OTP expiry window but not by much;
/// an abandoned flow disappears on its own.
const PENDING_COOKIE_DURATION: Duration = Duration::minutes(30);

/// Which flow an outstanding OTP belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OtpFlow {
    /// Completing a log-in.
    LogIn,
    /// Completing a sign-up; verification also activates the account.
    SignUp,
}

/// An OTP has been emailed and the client is expected to submit it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct PendingOtp {
    /// The account the OTP was issued for.
    pub(crate) account_id: AccountId,
    /// The flow that issued the OTP.
    pub(crate) flow: OtpFlow,
}

/// A password reset is underway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct PendingReset {
    /// The account whose password is being reset.
    pub(crate) account_id: AccountId,
    /// Whether the reset OTP has been verified. Only a verified reset may
    /// commit a new password.
    pub(crate) verified: bool,
}

fn set_pending_cookie<T: Serialize>(
    jar: PrivateCookieJar,
    name: &'static str,
    state: &T,
) -> Result<PrivateCookieJar, Error> {
    let value = serde_json::to_string(state)
        .map_err(|error| Error::SerializationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((name, value))
            .path("/")
            .expires(OffsetDateTime::now_utc() + PENDING_COOKIE_DURATION)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

fn get_pending_cookie<T: DeserializeOwned>(jar: &PrivateCookieJar, name: &'static str) -> Option<T> {
    let cookie = jar.get(name)?;

    serde_json::from_str(cookie.value_trimmed()).ok()
}

fn clear_pending_cookie(jar: PrivateCookieJar, name: &'static str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((name, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Record that an OTP is outstanding for `state.account_id`.
pub(crate) fn set_pending_otp(
    jar: PrivateCookieJar,
    state: PendingOtp,
) -> Result<PrivateCookieJar, Error> {
    set_pending_cookie(jar, COOKIE_PENDING_OTP, &state)
}

/// The outstanding OTP state, if any.
pub(crate) fn get_pending_otp(jar: &PrivateCookieJar) -> Option<PendingOtp> {
    get_pending_cookie(jar, COOKIE_PENDING_OTP)
}

/// Clear the outstanding OTP state.
pub(crate) fn clear_pending_otp(jar: PrivateCookieJar) -> PrivateCookieJar {
    clear_pending_cookie(jar, COOKIE_PENDING_OTP)
}

/// Record that a password reset is underway for `state.account_id`.
pub(crate) fn set_pending_reset(
    jar: PrivateCookieJar,
    state: PendingReset,
) -> Result<PrivateCookieJar, Error> {
    set_pending_cookie(jar, COOKIE_PENDING_RESET, &state)
}

/// The password-reset state, if any.
pub(crate) fn get_pending_reset(jar: &PrivateCookieJar) -> Option<PendingReset> {
    get_pending_cookie(jar, COOKIE_PENDING_RESET)
}

/// Clear the password-reset state.
pub(crate) fn clear_pending_reset(jar: PrivateCookieJar) -> PrivateCookieJar {
    clear_pending_cookie(jar, COOKIE_PENDING_RESET)
}
