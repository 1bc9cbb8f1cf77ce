//! Input validation shared by registration, profile edits and the catalog.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{EmailError, MoneyError, UsernameError};

/// Minimum number of characters in a password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Format accepted for birth dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A request was well-formed but its content breaks a rule.
///
/// Messages are user-facing and returned verbatim to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("all fields are required")]
    MissingFields,
    #[error("{0} is required")]
    Required(&'static str),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("email is already registered")]
    EmailTaken,
    #[error("category name is already in use")]
    CategoryNameTaken,
    #[error("malformed date, expected YYYY-MM-DD: {0}")]
    MalformedDate(String),
    #[error("{field} cannot be negative")]
    Negative { field: &'static str },
    #[error("{field} is too large")]
    TooLarge { field: &'static str },
    #[error("category does not exist")]
    UnknownCategory,
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Username(#[from] UsernameError),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Check a new password and its confirmation.
///
/// # Errors
///
/// Fails if either value is empty, they differ, or the password is shorter
/// than [`MIN_PASSWORD_LENGTH`] characters.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password.is_empty() || confirmation.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedDate`] for anything else.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::MalformedDate(raw.trim().to_owned()))
}

/// Trimmed value, or `None` if the field was omitted or blank.
///
/// Profile edits only apply the fields that carry a value.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules_in_order() {
        assert_eq!(
            validate_new_password("", "x"),
            Err(ValidationError::MissingFields)
        );
        assert_eq!(
            validate_new_password("abcdefgh", "abcdefgx"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_new_password("short", "short"),
            Err(ValidationError::PasswordTooShort)
        );
        assert_eq!(validate_new_password("longenough", "longenough"), Ok(()));
    }

    #[test]
    fn test_password_length_counts_characters() {
        // 8 characters, 16 bytes
        assert_eq!(validate_new_password("ññññññññ", "ññññññññ"), Ok(()));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("1999-12-31"),
            Ok(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap_or_default())
        );
        assert!(matches!(
            parse_date("31/12/1999"),
            Err(ValidationError::MalformedDate(_))
        ));
        assert!(parse_date("2023-02-30").is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
