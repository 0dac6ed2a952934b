//! The log-out handler.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    auth::{
        cookie::invalidate_auth_cookie,
        middleware::AuthState,
        pending::{clear_pending_otp, clear_pending_reset},
    },
    endpoints,
};

/// Handler for logging out.
///
/// Clears the session cookie and any pending-flow cookies, then redirects
/// to the log-in page. Safe to call when not logged in.
pub(crate) async fn get_log_out(State(_state): State<AuthState>, jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);
    let jar = clear_pending_otp(jar);
    let jar = clear_pending_reset(jar);

    (jar, Redirect::to(endpoints::LOG_IN_VIEW)).into_response()
}
