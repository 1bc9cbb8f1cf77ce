//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! gamerly-cli user create-admin -u admin -e admin@gamerly.local -p 'long password'
//! gamerly-cli user promote -u player1
//! ```

use thiserror::Error;

use gamerly_core::validation::validate_new_password;
use gamerly_core::{Email, UserId, UserRole, Username, ValidationError};
use gamerly_storefront::db::users::NewUser;
use gamerly_storefront::db::{RepositoryError, UserRepository};
use gamerly_storefront::services::auth::hash_password;

use super::connect;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    #[error("User already exists with that {0}")]
    UserExists(String),

    #[error("No user named {0}")]
    UnknownUser(String),

    #[error("Could not hash password")]
    PasswordHash,

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checked credentials for a new administrator.
#[derive(Debug)]
struct AdminInput {
    username: Username,
    email: Email,
}

fn validate_admin(username: &str, email: &str, password: &str) -> Result<AdminInput, UserError> {
    validate_new_password(password, password)?;
    Ok(AdminInput {
        username: Username::parse(username).map_err(ValidationError::from)?,
        email: Email::parse(email).map_err(ValidationError::from)?,
    })
}

/// Create a new user with the admin role, together with their profile and
/// cart.
///
/// # Errors
///
/// Returns an error if the input is invalid, the username or email is
/// taken, or the database is unreachable.
pub async fn create_admin(
    username: &str,
    email: &str,
    password: &str,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let input = validate_admin(username, email, password)?;
    let password_hash = hash_password(password).map_err(|_| UserError::PasswordHash)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    tracing::info!("Creating admin user: {}", input.username.as_str());
    let user = users
        .create_account(&NewUser {
            username: input.username.as_str(),
            email: &input.email,
            first_name: "",
            last_name: "",
            password_hash: &password_hash,
            role: UserRole::Admin,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(field) => UserError::UserExists(field),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Username: {}, Email: {}",
        user.id,
        user.username,
        user.email.as_str()
    );
    Ok(user.id)
}

/// Give an existing user the admin role.
///
/// # Errors
///
/// Returns an error if no user has that username or the database is
/// unreachable.
pub async fn promote(username: &str) -> Result<UserId, Box<dyn std::error::Error>> {
    let pool = connect().await?;

    let user_id = UserRepository::new(&pool)
        .set_role(username.trim(), UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserError::UnknownUser(username.to_owned()),
            other => UserError::Repository(other),
        })?;

    tracing::info!("User {} (ID {}) is now an admin", username.trim(), user_id);
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_admin_accepts_good_input() {
        let input = validate_admin("root_admin", "Admin@Gamerly.local", "correct horse");
        assert!(input.is_ok_and(|i| i.email.as_str() == "admin@gamerly.local"));
    }

    #[test]
    fn test_validate_admin_rejects_short_password() {
        assert!(matches!(
            validate_admin("root_admin", "admin@gamerly.local", "short"),
            Err(UserError::Invalid(ValidationError::PasswordTooShort))
        ));
    }

    #[test]
    fn test_validate_admin_rejects_bad_email() {
        assert!(matches!(
            validate_admin("root_admin", "not-an-email", "correct horse"),
            Err(UserError::Invalid(ValidationError::Email(_)))
        ));
    }
}
