//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/transactions/{transaction_id}',
//! use [format_endpoint].

/// The landing page, showing the ledger dashboard (anonymous-friendly).
pub const DASHBOARD_VIEW: &str = "/";
/// The route for getting the sign-up page.
pub const SIGN_UP_VIEW: &str = "/sign_up";
/// The route for getting the log-in page.
pub const LOG_IN_VIEW: &str = "/log_in";
/// The page where the user enters the emailed one-time passcode.
pub const VERIFY_VIEW: &str = "/verify";
/// The page for requesting a password reset code.
pub const FORGOT_PASSWORD_VIEW: &str = "/forgot_password";
/// The page showing the logged-in user's profile.
pub const PROFILE_VIEW: &str = "/profile";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";
/// The route for uploaded media such as avatars.
pub const MEDIA: &str = "/media";

/// The route for starting a sign-up.
pub const SIGN_UP_API: &str = "/api/sign_up";
/// The route for starting a log-in (sends the OTP email).
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for submitting a one-time passcode.
pub const VERIFY_API: &str = "/api/verify";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route for requesting a password reset code.
pub const FORGOT_PASSWORD_API: &str = "/api/forgot_password";
/// The route for submitting the password reset code.
pub const RESET_VERIFY_API: &str = "/api/forgot_password/verify";
/// The route for committing a new password after a verified reset.
pub const RESET_PASSWORD_API: &str = "/api/forgot_password/reset";
/// The route to record a new transaction.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to delete a single transaction.
pub const DELETE_TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to update the user's profile.
pub const PROFILE_API: &str = "/api/profile";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace. For
/// example, in '/api/transactions/{transaction_id}' the parameter is
/// '{transaction_id}'.
///
/// If `endpoint_path` has no parameter, it is returned unchanged.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it
// will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "invalid URI: {uri}");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::DASHBOARD_VIEW);
        assert_endpoint_is_valid_uri(endpoints::SIGN_UP_VIEW);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN_VIEW);
        assert_endpoint_is_valid_uri(endpoints::VERIFY_VIEW);
        assert_endpoint_is_valid_uri(endpoints::FORGOT_PASSWORD_VIEW);
        assert_endpoint_is_valid_uri(endpoints::PROFILE_VIEW);
        assert_endpoint_is_valid_uri(endpoints::INTERNAL_ERROR_VIEW);
        assert_endpoint_is_valid_uri(endpoints::STATIC);
        assert_endpoint_is_valid_uri(endpoints::MEDIA);

        assert_endpoint_is_valid_uri(endpoints::SIGN_UP_API);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN_API);
        assert_endpoint_is_valid_uri(endpoints::VERIFY_API);
        assert_endpoint_is_valid_uri(endpoints::LOG_OUT);
        assert_endpoint_is_valid_uri(endpoints::FORGOT_PASSWORD_API);
        assert_endpoint_is_valid_uri(endpoints::RESET_VERIFY_API);
        assert_endpoint_is_valid_uri(endpoints::RESET_PASSWORD_API);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS_API);
        assert_endpoint_is_valid_uri(endpoints::DELETE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::PROFILE_API);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint(endpoints::DELETE_TRANSACTION, 42);

        assert_eq!(formatted_path, "/api/transactions/42");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
