//! Password validation and hashing.
//!
//! [ValidatedPassword] wraps a raw password string that has passed the
//! strength policy, and [PasswordHash] turns one into a salted bcrypt hash.

use std::fmt::Display;

use bcrypt::{hash, verify};
use serde::{Deserialize, Serialize};
use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::Error;

/// A password that has passed the strength policy but has not been hashed.
///
/// Use this to construct a [PasswordHash].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Validate a raw password string against the strength policy.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] when the password scores too low. The
    /// error message explains why and suggests how to pick a stronger
    /// password, and is intended to be shown to the user.
    pub fn new(raw_password: &str) -> Result<Self, Error> {
        let analysis = zxcvbn(raw_password, &[]);

        match analysis.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_string())),
            _ => Err(Error::TooWeak(
                analysis
                    .feedback()
                    .unwrap_or(&Feedback::default())
                    .to_string(),
            )),
        }
    }

    /// Create a `ValidatedPassword` without running the strength policy.
    ///
    /// The caller should ensure the password is acceptable. Not `unsafe`
    /// because a weak password cannot affect memory safety.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_string())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash a validated password with the given bcrypt `cost`.
    ///
    /// A cost of at least 12 is recommended, use
    /// [PasswordHash::DEFAULT_COST] if in doubt. Tests use a lower cost
    /// to stay fast.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap an existing hash string, e.g. one loaded from the database.
    ///
    /// The caller should ensure that `raw_hash` is a valid bcrypt hash.
    pub fn new_unchecked(raw_hash: &str) -> Self {
        Self(raw_hash.to_string())
    }

    /// Validate and hash a raw password string in one step.
    ///
    /// A named constructor is used instead of `FromStr` to make it clear
    /// that this does not parse an existing hash.
    pub fn from_raw_password(raw_password: &str, cost: u32) -> Result<Self, Error> {
        PasswordHash::new(ValidatedPassword::new(raw_password)?, cost)
    }

    /// Check that `raw_password` matches the stored hash.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the stored hash could not be
    /// parsed by the hashing library.
    pub fn verify(&self, raw_password: &str) -> Result<bool, Error> {
        verify(raw_password, &self.0).map_err(|error| Error::HashingError(error.to_string()))
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
