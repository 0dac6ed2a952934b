//! Authentication: sign-up, OTP log-in, password reset and sessions.
//!
//! All flows follow the same shape: a start operation that emails a
//! one-time passcode and records a pending state in a private cookie, and
//! a verify operation that consumes the passcode and advances the state.

mod cookie;
mod forgot_password;
mod log_in;
mod log_out;
mod middleware;
mod otp;
mod pending;
mod sign_up;
mod verify;

pub(crate) use cookie::{DEFAULT_SESSION_DURATION, session_account};
pub(crate) use forgot_password::{
    get_forgot_password_page, post_forgot_password, post_reset_password, post_reset_verify,
};
pub(crate) use log_in::{get_log_in_page, post_log_in};
pub(crate) use log_out::get_log_out;
pub(crate) use middleware::{auth_guard, auth_guard_hx};
pub(crate) use otp::{DEFAULT_OTP_EXPIRY, OtpPurpose, create_otp_table, issue_otp};
pub(crate) use sign_up::{get_sign_up_page, post_sign_up};
pub(crate) use verify::{get_verify_page, post_verify};

#[cfg(test)]
pub(crate) use cookie::{COOKIE_SESSION, set_auth_cookie};

#[cfg(test)]
pub(crate) use otp::{most_recent_otp_for, store_otp};

#[cfg(test)]
pub(crate) use pending::{COOKIE_PENDING_OTP, OtpFlow, PendingOtp};
