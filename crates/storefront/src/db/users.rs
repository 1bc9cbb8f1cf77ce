//! User and profile repository.

use sqlx::{PgConnection, PgPool};

use gamerly_core::{Email, UserId, UserRole};

use super::{RepositoryError, carts};
use crate::models::{Account, Profile, ProfileUpdate, User};

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.first_name, u.last_name, u.created_at";
const PROFILE_COLUMNS: &str =
    "p.user_id, p.role, p.phone, p.address, p.birth_date, p.active, p.registered_at";

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a Email,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    #[sqlx(flatten)]
    user: User,
    #[sqlx(flatten)]
    profile: Profile,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user u WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user u WHERE u.username = $1"
        ))
        .bind(username.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user u WHERE u.email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Look up a user and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, u.password_hash FROM storefront.user u WHERE u.username = $1"
        ))
        .bind(username.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn get_password_hash(&self, id: UserId) -> Result<String, RepositoryError> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM storefront.user WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM storefront.user WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Whether `email` belongs to any user other than `except`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_taken(
        &self,
        email: &Email,
        except: Option<UserId>,
    ) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM storefront.user
                WHERE email = $1 AND ($2::int IS NULL OR id <> $2)
            )",
        )
        .bind(email)
        .bind(except)
        .fetch_one(self.pool)
        .await?;
        Ok(taken)
    }

    /// Create a user, their profile and their cart in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict("username")` or
    /// `RepositoryError::Conflict("email")` on a duplicate.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_account(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO storefront.user (username, email, first_name, last_name, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, username, email, first_name, last_name, created_at",
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.first_name.trim())
        .bind(new.last_name.trim())
        .bind(new.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("email") => "email",
                    _ => "username",
                };
                return RepositoryError::Conflict(field.to_owned());
            }
            RepositoryError::Database(e)
        })?;

        ensure_profile(&mut tx, user.id, new.role).await?;
        carts::ensure_cart(&mut tx, user.id).await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Account created");
        Ok(user)
    }

    /// Create the profile and cart for a user that lacks them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ensure_defaults(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_profile(&mut tx, id, UserRole::Customer).await?;
        carts::ensure_cart(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_account(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {USER_COLUMNS}, {PROFILE_COLUMNS}
             FROM storefront.user u
             JOIN storefront.profile p ON p.user_id = u.id
             WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|r| Account {
            user: r.user,
            profile: r.profile,
        }))
    }

    /// Current role, or `None` if the user has no profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_role(&self, id: UserId) -> Result<Option<UserRole>, RepositoryError> {
        let role = sqlx::query_scalar::<_, UserRole>(
            "SELECT role FROM storefront.profile WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(role)
    }

    /// Apply the non-empty fields of `update`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict("email")` if the email is in use.
    /// Returns `RepositoryError::NotFound` if the user has no profile.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE storefront.user SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.email.as_ref())
        .execute(&mut *tx)
        .await
        .map_err(super::conflict_on_unique("email"))?;

        let result = sqlx::query(
            "UPDATE storefront.profile SET
                phone = COALESCE($2, phone),
                address = COALESCE($3, address),
                birth_date = COALESCE($4, birth_date)
             WHERE user_id = $1",
        )
        .bind(id)
        .bind(update.phone.as_deref())
        .bind(update.address.as_deref())
        .bind(update.birth_date)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        set_password_hash(&mut conn, id, password_hash).await
    }

    /// Set a user's role, creating the profile if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has that username.
    pub async fn set_role(&self, username: &str, role: UserRole) -> Result<UserId, RepositoryError> {
        let user = self
            .get_by_username(username)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "INSERT INTO storefront.profile (user_id, role) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(user.id)
        .bind(role)
        .execute(self.pool)
        .await?;

        tracing::info!(user_id = %user.id, %role, "Role updated");
        Ok(user.id)
    }
}

/// Create the profile for a user if it does not exist yet.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ensure_profile(
    conn: &mut PgConnection,
    user_id: UserId,
    role: UserRole,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO storefront.profile (user_id, role) VALUES ($1, $2)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(role)
    .execute(conn)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user does not exist.
pub async fn set_password_hash(
    conn: &mut PgConnection,
    user_id: UserId,
    password_hash: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE storefront.user SET password_hash = $2, updated_at = now() WHERE id = $1",
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
