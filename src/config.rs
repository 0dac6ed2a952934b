//! Application configuration, resolved once at startup.
//!
//! Everything secret or environment-specific comes from environment
//! variables and is validated up front: a missing SMTP credential fails
//! the boot with a clear message instead of surfacing as a broken email
//! flow at 3am.

use std::env;

use time::Duration;

use crate::LowBalancePolicy;

/// A configuration value could not be resolved.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("the environment variable '{0}' must be set")]
    MissingVariable(&'static str),

    /// An environment variable is set to something unusable.
    #[error("the environment variable '{0}' is invalid: {1}")]
    InvalidVariable(&'static str, String),
}

/// The application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Secret used to derive the cookie signing/encryption key.
    pub cookie_secret: String,
    /// The SMTP relay host.
    pub smtp_host: String,
    /// The SMTP username.
    pub smtp_username: String,
    /// The SMTP password.
    pub smtp_password: String,
    /// The From address on outgoing email, e.g.
    /// "Ledgerly <noreply@example.com>".
    pub email_sender: String,
    /// How long an emailed one-time passcode stays valid.
    pub otp_expiry: Duration,
    /// When to send the low-balance warning email.
    pub low_balance: LowBalancePolicy,
    /// The local timezone as a canonical timezone name, e.g.
    /// "Pacific/Auckland".
    pub local_timezone: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVariable(name)),
    }
}

fn optional_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidVariable(name, value)),
        Err(_) => Ok(default),
    }
}

fn optional_minutes(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<i64>()
            .map(Duration::minutes)
            .map_err(|_| ConfigError::InvalidVariable(name, value)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Resolve the configuration from environment variables.
    ///
    /// Required: `COOKIE_SECRET`, `SMTP_HOST`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD`, `EMAIL_SENDER`. Optional, with defaults:
    /// `OTP_EXPIRY_MINUTES` (10), `LOW_BALANCE_THRESHOLD` (100),
    /// `LOW_BALANCE_STEP` (50), `TZ` (Etc/UTC).
    ///
    /// # Errors
    ///
    /// Returns a [ConfigError] naming the first variable that is missing
    /// or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_policy = LowBalancePolicy::default();

        Ok(Self {
            cookie_secret: required("COOKIE_SECRET")?,
            smtp_host: required("SMTP_HOST")?,
            smtp_username: required("SMTP_USERNAME")?,
            smtp_password: required("SMTP_PASSWORD")?,
            email_sender: required("EMAIL_SENDER")?,
            otp_expiry: optional_minutes(
                "OTP_EXPIRY_MINUTES",
                crate::auth::DEFAULT_OTP_EXPIRY,
            )?,
            low_balance: LowBalancePolicy {
                threshold: optional_f64("LOW_BALANCE_THRESHOLD", default_policy.threshold)?,
                renotify_step: optional_f64("LOW_BALANCE_STEP", default_policy.renotify_step)?,
            },
            local_timezone: env::var("TZ").unwrap_or_else(|_| "Etc/UTC".to_owned()),
        })
    }
}

#[cfg(test)]
mod config_tests {
    use super::{ConfigError, optional_f64, optional_minutes, required};

    // Environment-variable state is shared across the test binary, so
    // these tests use variable names no other test touches.

    #[test]
    fn required_reports_missing_variable() {
        assert_eq!(
            required("LEDGERLY_TEST_UNSET_VARIABLE"),
            Err(ConfigError::MissingVariable("LEDGERLY_TEST_UNSET_VARIABLE"))
        );
    }

    #[test]
    fn optional_values_fall_back_to_defaults() {
        assert_eq!(
            optional_f64("LEDGERLY_TEST_UNSET_THRESHOLD", 100.0),
            Ok(100.0)
        );
        assert_eq!(
            optional_minutes("LEDGERLY_TEST_UNSET_MINUTES", time::Duration::minutes(10)),
            Ok(time::Duration::minutes(10))
        );
    }

    #[test]
    fn invalid_number_is_reported() {
        // SAFETY: no other test reads or writes this variable.
        unsafe {
            std::env::set_var("LEDGERLY_TEST_BAD_THRESHOLD", "lots");
        }

        assert_eq!(
            optional_f64("LEDGERLY_TEST_BAD_THRESHOLD", 100.0),
            Err(ConfigError::InvalidVariable(
                "LEDGERLY_TEST_BAD_THRESHOLD",
                "lots".to_owned()
            ))
        );
    }
}
