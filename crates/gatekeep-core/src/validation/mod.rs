//! Input validation for identities and passwords.
//!
//! Every operation validates its inputs here before touching the directory
//! or the gateway.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Symbols accepted (and one of which is required) in passwords.
pub const PASSWORD_SYMBOLS: &str = "@$!%*#?&";

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted identity length.
pub const MAX_IDENTITY_LENGTH: usize = 254;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").ok());

/// Validation error types.
///
/// `InvalidCredentials` is returned both for unknown identities and wrong
/// passwords so callers cannot tell the two apart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identity is not a well-formed email address.
    #[error("Invalid email format")]
    InvalidIdentity,

    /// Password does not satisfy the password policy.
    #[error(
        "Password must be at least 8 characters long, contain letters, numbers, and a special symbol."
    )]
    WeakPassword,

    /// Authentication failed.
    #[error("Invalid credentials Or User Not Exist")]
    InvalidCredentials,

    /// Required request fields were missing or empty.
    #[error("Missing fields: {0:?}")]
    MissingFields(Vec<String>),

    /// Input could not be decoded.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Validate a user identity (email address).
///
/// # Errors
///
/// Returns `ValidationError::InvalidIdentity` if the identity is malformed.
pub fn validate_identity(identity: &str) -> Result<(), ValidationError> {
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LENGTH {
        return Err(ValidationError::InvalidIdentity);
    }

    match EMAIL_RE.as_ref() {
        Some(re) if re.is_match(identity) => Ok(()),
        _ => Err(ValidationError::InvalidIdentity),
    }
}

/// Validate a password against the policy.
///
/// Policy: at least 8 characters; at least one ASCII letter, one digit and
/// one symbol from [`PASSWORD_SYMBOLS`]; no other characters.
///
/// # Errors
///
/// Returns `ValidationError::WeakPassword` if the policy is not met.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));

    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if allowed
        && password.chars().count() >= MIN_PASSWORD_LENGTH
        && has_letter
        && has_digit
        && has_symbol
    {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

/// Report which of the named fields are missing or empty.
///
/// # Errors
///
/// Returns `ValidationError::MissingFields` listing every absent field.
pub fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<(), ValidationError> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.is_none_or(str::is_empty))
        .map(|(name, _)| (*name).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}
