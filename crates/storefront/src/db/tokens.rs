//! One-time token persistence.
//!
//! Only SHA-256 digests are stored. Verification locks the matching row so a
//! token cannot be consumed by two requests at once.

use sqlx::{PgPool, Postgres, Transaction};

use gamerly_core::{OneTimeToken, TokenPurpose, UserId};

use super::RepositoryError;
use super::users::set_password_hash;

const TOKEN_COLUMNS: &str = "id, user_id, purpose, created_at, used";

/// Repository for one-time tokens.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token, discarding the user's earlier tokens of the same
    /// purpose in the same transaction.
    ///
    /// The live row is upserted against the unique index on unused tokens,
    /// so concurrent issues for one user leave a single live token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn replace(
        &self,
        user_id: UserId,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> Result<OneTimeToken, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let token = sqlx::query_as::<_, OneTimeToken>(&format!(
            "INSERT INTO storefront.one_time_token (user_id, purpose, token_hash)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, purpose) WHERE NOT used
             DO UPDATE SET token_hash = EXCLUDED.token_hash, created_at = now()
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(user_id)
        .bind(purpose)
        .bind(token_hash)
        .fetch_one(&mut *tx)
        .await?;

        let discarded = sqlx::query(
            "DELETE FROM storefront.one_time_token
             WHERE user_id = $1 AND purpose = $2 AND id <> $3",
        )
        .bind(user_id)
        .bind(purpose)
        .bind(token.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(user_id = %user_id, ?purpose, discarded, "Token issued");
        Ok(token)
    }

    /// Find a recovery token by digest without locking it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_recovery(
        &self,
        token_hash: &str,
    ) -> Result<Option<OneTimeToken>, RepositoryError> {
        let token = sqlx::query_as::<_, OneTimeToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM storefront.one_time_token
             WHERE token_hash = $1 AND purpose = 'password_recovery'"
        ))
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(token)
    }

    /// Lock a recovery token by digest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no token matches.
    pub async fn lock_recovery(&self, token_hash: &str) -> Result<LockedToken, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let token = sqlx::query_as::<_, OneTimeToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM storefront.one_time_token
             WHERE token_hash = $1 AND purpose = 'password_recovery'
             FOR UPDATE"
        ))
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(LockedToken { tx, token })
    }

    /// Lock a login code belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no token matches.
    pub async fn lock_login(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<LockedToken, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let token = sqlx::query_as::<_, OneTimeToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM storefront.one_time_token
             WHERE user_id = $1 AND token_hash = $2 AND purpose = 'login'
             FOR UPDATE"
        ))
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(LockedToken { tx, token })
    }
}

/// A token row held under a lock. Dropping it rolls back.
pub struct LockedToken {
    tx: Transaction<'static, Postgres>,
    pub token: OneTimeToken,
}

impl LockedToken {
    /// Persist the used flag and commit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_used(mut self) -> Result<OneTimeToken, RepositoryError> {
        self.write_used().await?;
        self.tx.commit().await?;
        Ok(self.token)
    }

    /// Persist the used flag and a new password hash atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either update fails.
    pub async fn mark_used_with_password(
        mut self,
        password_hash: &str,
    ) -> Result<OneTimeToken, RepositoryError> {
        self.write_used().await?;
        set_password_hash(&mut self.tx, self.token.user_id, password_hash).await?;
        self.tx.commit().await?;
        Ok(self.token)
    }

    async fn write_used(&mut self) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.one_time_token SET used = TRUE WHERE id = $1")
            .bind(self.token.id)
            .execute(&mut *self.tx)
            .await?;
        self.token.used = true;
        Ok(())
    }
}
