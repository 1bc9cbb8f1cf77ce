//! Authentication error types.

use thiserror::Error;

use gamerly_core::{TokenError, ValidationError};

use crate::db::RepositoryError;
use crate::services::email::EmailError;
use crate::services::tokens::TokenServiceError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Submitted fields break a registration or password rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The current password given for a change did not verify.
    #[error("current password is incorrect")]
    WrongPassword,

    /// The profile has been deactivated.
    #[error("account is disabled")]
    AccountDisabled,

    /// No login is waiting for a code in this session.
    #[error("no login in progress")]
    NoPendingLogin,

    /// Login code or recovery token rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Login code or recovery email could not be delivered.
    #[error("email delivery failed: {0}")]
    Email(#[from] EmailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<TokenServiceError> for AuthError {
    fn from(err: TokenServiceError) -> Self {
        match err {
            TokenServiceError::Token(e) => Self::Token(e),
            TokenServiceError::Repository(e) => Self::Repository(e),
        }
    }
}
