//! The low-balance warning email.
//!
//! After the dashboard computes a balance, the account owner is warned by
//! email when it sits at or below a configured threshold. A marker cookie
//! remembers the balance at the last warning so the user is not emailed on
//! every request; a further warning goes out only once the balance has
//! dropped by a configured step, and the marker resets as soon as the
//! balance climbs back above the threshold.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};

use crate::{Notifier, account::Account, html::format_currency};

pub(crate) const COOKIE_LOW_BALANCE: &str = "low_balance_notified_at";

/// When the low-balance warning fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowBalancePolicy {
    /// Warn when the balance is at or below this value.
    pub threshold: f64,
    /// After a warning, stay quiet until the balance has dropped by at
    /// least this much more.
    pub renotify_step: f64,
}

impl Default for LowBalancePolicy {
    fn default() -> Self {
        Self {
            threshold: 100.0,
            renotify_step: 50.0,
        }
    }
}

fn marker(jar: &PrivateCookieJar) -> Option<f64> {
    jar.get(COOKIE_LOW_BALANCE)?.value_trimmed().parse().ok()
}

fn set_marker(jar: PrivateCookieJar, balance: f64) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_LOW_BALANCE, balance.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

fn clear_marker(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build((COOKIE_LOW_BALANCE, "")).path("/"))
}

/// Warn `account` about a low `balance` if the policy says so.
///
/// The dispatch is best-effort: a failed send is logged and the enclosing
/// request carries on. Returns the cookie jar, with the marker updated
/// when a warning went out or cleared when the balance has recovered.
pub(crate) fn check_low_balance(
    jar: PrivateCookieJar,
    policy: &LowBalancePolicy,
    account: &Account,
    balance: f64,
    notifier: &dyn Notifier,
) -> PrivateCookieJar {
    if balance > policy.threshold {
        if marker(&jar).is_some() {
            return clear_marker(jar);
        }
        return jar;
    }

    let should_notify = match marker(&jar) {
        None => true,
        Some(notified_at) => notified_at - balance >= policy.renotify_step,
    };

    if !should_notify {
        return jar;
    }

    let body = format!(
        "Hi {},\n\nYour balance has dropped to {}. \
         Time to take a look at your spending.",
        account.username,
        format_currency(balance),
    );

    match notifier.send(&account.email, "low balance warning", &body) {
        Ok(()) => set_marker(jar, balance),
        Err(error) => {
            tracing::warn!("Could not send low balance warning: {error}");
            jar
        }
    }
}
