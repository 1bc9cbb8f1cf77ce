//! One-time token issuing and verification.
//!
//! Raw tokens are only ever returned to the caller for emailing; the database
//! holds their SHA-256 digest. Login codes are six digits and are always
//! checked together with the user they were issued to. Recovery tokens are
//! UUIDv4 strings and are looked up by digest alone.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use gamerly_core::{OneTimeToken, TokenError, TokenPurpose, UserId};

use crate::db::tokens::LockedToken;
use crate::db::{RepositoryError, TokenRepository};

#[derive(Debug, Error)]
pub enum TokenServiceError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for TokenServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::Token(TokenError::NotFound),
            other => Self::Repository(other),
        }
    }
}

/// Generate a 6-digit login code.
#[must_use]
pub fn generate_login_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Generate a recovery token.
#[must_use]
pub fn generate_recovery_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Hex SHA-256 digest of a raw token, as stored.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.trim().as_bytes()))
}

/// Token operations for the login second factor and password recovery.
pub struct TokenService<'a> {
    tokens: TokenRepository<'a>,
}

impl<'a> TokenService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            tokens: TokenRepository::new(pool),
        }
    }

    /// Issue a login code, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `TokenServiceError::Repository` if the token cannot be stored.
    #[instrument(skip(self))]
    pub async fn issue_login_code(&self, user_id: UserId) -> Result<String, TokenServiceError> {
        let code = generate_login_code();
        self.tokens
            .replace(user_id, TokenPurpose::Login, &hash_token(&code))
            .await?;
        Ok(code)
    }

    /// Issue a recovery token, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `TokenServiceError::Repository` if the token cannot be stored.
    #[instrument(skip(self))]
    pub async fn issue_recovery_token(&self, user_id: UserId) -> Result<String, TokenServiceError> {
        let token = generate_recovery_token();
        self.tokens
            .replace(user_id, TokenPurpose::PasswordRecovery, &hash_token(&token))
            .await?;
        Ok(token)
    }

    /// Check a recovery token without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::NotFound` for an unknown token and
    /// `TokenError::ExpiredOrUsed` for one that is no longer active.
    #[instrument(skip_all)]
    pub async fn check_recovery_token(&self, raw: &str) -> Result<OneTimeToken, TokenServiceError> {
        let token = self
            .tokens
            .find_recovery(&hash_token(raw))
            .await?
            .ok_or(TokenError::NotFound)?;
        if !token.is_valid_at(Utc::now()) {
            return Err(TokenError::ExpiredOrUsed.into());
        }
        Ok(token)
    }

    /// Consume a login code issued to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::NotFound` if the code does not match and
    /// `TokenError::ExpiredOrUsed` if it is no longer active.
    #[instrument(skip(self, code))]
    pub async fn verify_login_code(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<OneTimeToken, TokenServiceError> {
        let locked = self.tokens.lock_login(user_id, &hash_token(code)).await?;
        let locked = consume(locked)?;
        Ok(locked.mark_used().await?)
    }

    /// Consume a recovery token and store `password_hash` for its owner in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::NotFound` for an unknown token and
    /// `TokenError::ExpiredOrUsed` for one that is no longer active.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        raw: &str,
        password_hash: &str,
    ) -> Result<UserId, TokenServiceError> {
        let locked = self.tokens.lock_recovery(&hash_token(raw)).await?;
        let locked = consume(locked)?;
        let token = locked.mark_used_with_password(password_hash).await?;
        tracing::info!(user_id = %token.user_id, "Password reset with recovery token");
        Ok(token.user_id)
    }
}

/// Apply the state machine to a locked row. On failure the lock is dropped
/// and the transaction rolls back untouched.
fn consume(mut locked: LockedToken) -> Result<LockedToken, TokenError> {
    let mut token = locked.token.clone();
    token.consume(Utc::now())?;
    locked.token = token;
    Ok(locked)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_code_format() {
        for _ in 0..100 {
            let code = generate_login_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_recovery_tokens_are_unique_uuids() {
        let a = generate_recovery_token();
        let b = generate_recovery_token();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("123456");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_token(" 123456 "));
        assert_ne!(digest, hash_token("123457"));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_repository_not_found_maps_to_token_not_found() {
        let err = TokenServiceError::from(RepositoryError::NotFound);
        assert!(matches!(err, TokenServiceError::Token(TokenError::NotFound)));
    }
}
