//! Authentication middleware that validates the session cookie, slides the
//! session expiry, and redirects anonymous clients to the log-in page.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use time::Duration;

use crate::{
    AppState,
    auth::cookie::{session_account, set_auth_cookie},
    endpoints,
};

/// The state needed for the auth middleware.
#[derive(Clone)]
pub(crate) struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub(crate) cookie_key: Key,
    /// The duration for which the session cookie is valid.
    pub(crate) cookie_duration: Duration,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Validate the session cookie, place the account ID into the request and
/// run it, otherwise return the redirect produced by `get_redirect`.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(account_id): Extension<AccountId>` to receive the account ID.
#[inline]
async fn auth_guard_internal(
    state: AuthState,
    request: Request,
    next: Next,
    get_redirect: impl Fn(&str) -> Response,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}. Redirecting to log in page.");
            return get_redirect(endpoints::LOG_IN_VIEW);
        }
    };

    let account_id = match session_account(&jar) {
        Some(account_id) => account_id,
        None => return get_redirect(endpoints::LOG_IN_VIEW),
    };

    parts.extensions.insert(account_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    // Slide the session expiry forward so an active user stays logged in.
    let (mut parts, body) = response.into_parts();
    let jar = match set_auth_cookie(jar.clone(), account_id, state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error refreshing session cookie: {err:?}.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

/// Middleware for page routes: anonymous clients get an HTTP redirect to
/// the log-in page.
pub(crate) async fn auth_guard(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        Redirect::to(redirect_url).into_response()
    })
    .await
}

/// Middleware for HTMX API routes: anonymous clients get an `HX-Redirect`
/// header so the browser navigates to the log-in page.
pub(crate) async fn auth_guard_hx(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        (HxRedirect(redirect_url.to_owned()), StatusCode::OK).into_response()
    })
    .await
}
