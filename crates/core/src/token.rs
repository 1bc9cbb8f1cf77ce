//! One-time email tokens.
//!
//! A token is valid for [`TOKEN_TTL_SECONDS`] after creation and can be
//! consumed once. Expired and used tokens are indistinguishable to callers.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{TokenId, TokenPurpose, UserId};

/// Lifetime of a token.
pub const TOKEN_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token not found")]
    NotFound,
    #[error("token has expired or was already used")]
    ExpiredOrUsed,
}

/// Where a token is in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Active,
    Expired,
    Used,
}

/// Stored token metadata. The secret itself is only ever held as a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OneTimeToken {
    pub id: TokenId,
    pub user_id: UserId,
    pub purpose: TokenPurpose,
    pub created_at: DateTime<Utc>,
    pub used: bool,
}

impl OneTimeToken {
    #[must_use]
    pub fn ttl() -> TimeDelta {
        TimeDelta::seconds(TOKEN_TTL_SECONDS)
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Self::ttl()
    }

    /// Used wins over expired.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.used {
            TokenState::Used
        } else if now >= self.expires_at() {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }

    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == TokenState::Active
    }

    /// Mark the token used if it is still active.
    ///
    /// # Errors
    ///
    /// [`TokenError::ExpiredOrUsed`] if the token is not active at `now`.
    pub fn consume(&mut self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if !self.is_valid_at(now) {
            return Err(TokenError::ExpiredOrUsed);
        }
        self.used = true;
        Ok(())
    }
}
