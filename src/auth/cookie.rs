//! The authenticated session cookie.
//!
//! The session is a JSON token inside a private (encrypted and signed)
//! cookie, so the server stores no session state of its own.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, account::AccountId};

pub(crate) const COOKIE_SESSION: &str = "session";

/// How long a session lasts without activity. Every authenticated request
/// slides the expiry forward by this much.
pub(crate) const DEFAULT_SESSION_DURATION: Duration = Duration::hours(2);

/// The token stored in the session cookie.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SessionToken {
    account_id: AccountId,

    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

/// Add the session cookie to the jar, marking the client as logged in as
/// `account_id` for `duration` from now.
///
/// Returns the cookie jar with the cookie added.
///
/// # Errors
///
/// Returns [Error::SerializationError] if the token cannot be serialized.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    account_id: AccountId,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc() + duration;
    let token = SessionToken {
        account_id,
        expires_at,
    };
    let value = serde_json::to_string(&token)
        .map_err(|error| Error::SerializationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_SESSION, value))
            .path("/")
            .expires(expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Set the session cookie to an invalid value and a max age of zero, which
/// deletes the cookie on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// The account the client is logged in as, or `None` when there is no
/// session cookie, it cannot be parsed, or the token has expired.
pub(crate) fn session_account(jar: &PrivateCookieJar) -> Option<AccountId> {
    let cookie = jar.get(COOKIE_SESSION)?;
    let token: SessionToken = serde_json::from_str(cookie.value_trimmed()).ok()?;

    if token.expires_at <= OffsetDateTime::now_utc() {
        return None;
    }

    Some(token.account_id)
}
