//! Authentication service.
//!
//! Password login with an emailed one-time code as second factor,
//! registration, password change and recovery by email link.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use gamerly_core::validation::validate_new_password;
use gamerly_core::{Email, TokenError, UserId, UserRole, Username, ValidationError};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::{Account, ProfileUpdate, User};
use crate::services::email::EmailService;
use crate::services::tokens::TokenService;

/// Registration form fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
}

/// How a recovery request identifies the account.
#[derive(Debug, PartialEq, Eq)]
enum RecoveryLookup<'a> {
    Email(Email),
    Username(&'a str),
    /// Contains `@` but is not an address. Matches nobody.
    Nothing,
}

impl<'a> RecoveryLookup<'a> {
    fn parse(identifier: &'a str) -> Self {
        if Email::looks_like_email(identifier) {
            Email::parse(identifier).map_or(Self::Nothing, Self::Email)
        } else {
            Self::Username(identifier)
        }
    }
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: TokenService<'a>,
    email: &'a EmailService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens: TokenService::new(pool),
            email,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a customer account. The user, profile and cart are created
    /// together.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a missing field, a password that
    /// breaks the rules, a malformed username or email, or one already taken.
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: &Registration) -> Result<Account, AuthError> {
        let required = [
            &form.username,
            &form.email,
            &form.first_name,
            &form.last_name,
            &form.password1,
            &form.password2,
        ];
        if required.iter().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::MissingFields.into());
        }
        validate_new_password(&form.password1, &form.password2)?;

        let username = Username::parse(&form.username).map_err(ValidationError::from)?;
        let email = Email::parse(&form.email).map_err(ValidationError::from)?;

        if self.users.username_exists(username.as_str()).await? {
            return Err(ValidationError::UsernameTaken.into());
        }
        if self.users.email_taken(&email, None).await? {
            return Err(ValidationError::EmailTaken.into());
        }

        let password_hash = hash_password(&form.password1)?;
        let user = self
            .users
            .create_account(&NewUser {
                username: username.as_str(),
                email: &email,
                first_name: &form.first_name,
                last_name: &form.last_name,
                password_hash: &password_hash,
                role: UserRole::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(field) if field == "email" => {
                    AuthError::Validation(ValidationError::EmailTaken)
                }
                RepositoryError::Conflict(_) => {
                    AuthError::Validation(ValidationError::UsernameTaken)
                }
                other => AuthError::Repository(other),
            })?;

        self.account(user.id).await
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Check a username and password.
    ///
    /// Accounts created outside registration get their profile and cart
    /// here.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a wrong
    /// password, and `AuthError::AccountDisabled` for a deactivated profile.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }

        let (user, password_hash) = self
            .users
            .get_credentials(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        self.users.ensure_defaults(user.id).await?;
        let account = self.account(user.id).await?;
        if !account.profile.active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(account)
    }

    /// First login step: check the password and email a login code.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::authenticate`], and `AuthError::Email`
    /// if the code cannot be delivered.
    #[instrument(skip(self, password))]
    pub async fn start_login(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let account = self.authenticate(username, password).await?;
        let user = &account.user;

        let code = self.tokens.issue_login_code(user.id).await?;
        self.email
            .send_login_code(user.email.as_str(), &user.username, &code)
            .await?;

        tracing::info!(user_id = %user.id, "Login code sent");
        Ok(account)
    }

    /// Second login step: consume the emailed code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the code does not match, has expired or
    /// was already used.
    #[instrument(skip(self, code))]
    pub async fn finish_login(&self, user_id: UserId, code: &str) -> Result<Account, AuthError> {
        if code.trim().is_empty() {
            return Err(ValidationError::Required("code").into());
        }
        self.tokens.verify_login_code(user_id, code).await?;
        self.account(user_id).await
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Change the password of a logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the new password breaks a rule and
    /// `AuthError::WrongPassword` if `current` does not verify.
    #[instrument(skip(self, current, new1, new2))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new1: &str,
        new2: &str,
    ) -> Result<(), AuthError> {
        if current.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        validate_new_password(new1, new2)?;

        let stored = self.users.get_password_hash(user_id).await?;
        verify_password(current, &stored).map_err(|_| AuthError::WrongPassword)?;

        let password_hash = hash_password(new1)?;
        self.users.set_password_hash(user_id, &password_hash).await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Email a recovery link to the account named by `identifier`.
    ///
    /// An unknown account is not an error, so callers cannot tell whether
    /// it exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Email` if the link cannot be delivered.
    #[instrument(skip(self, link_for))]
    pub async fn request_recovery(
        &self,
        identifier: &str,
        link_for: impl FnOnce(&str) -> String,
    ) -> Result<(), AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ValidationError::Required("email_or_username").into());
        }

        let user = match RecoveryLookup::parse(identifier) {
            RecoveryLookup::Email(email) => self.users.get_by_email(&email).await?,
            RecoveryLookup::Username(username) => self.users.get_by_username(username).await?,
            RecoveryLookup::Nothing => None,
        };
        let Some(user) = user else {
            tracing::info!("Recovery requested for unknown account");
            return Ok(());
        };

        let token = self.tokens.issue_recovery_token(user.id).await?;
        self.email
            .send_password_recovery(user.email.as_str(), &user.username, &link_for(&token))
            .await?;

        tracing::info!(user_id = %user.id, "Recovery link sent");
        Ok(())
    }

    /// The owner of a live recovery token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token is unknown, expired or used.
    pub async fn check_recovery(&self, token: &str) -> Result<User, AuthError> {
        let token = self.tokens.check_recovery_token(token).await?;
        self.users
            .get_by_id(token.user_id)
            .await?
            .ok_or(AuthError::Token(TokenError::NotFound))
    }

    /// Set a new password through a recovery token, consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Token` if the token is not live and
    /// `AuthError::Validation` if the password breaks a rule.
    pub async fn reset_password(
        &self,
        token: &str,
        new1: &str,
        new2: &str,
    ) -> Result<UserId, AuthError> {
        self.tokens.check_recovery_token(token).await?;
        validate_new_password(new1, new2)?;

        let password_hash = hash_password(new1)?;
        Ok(self.tokens.reset_password(token, &password_hash).await?)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Load a user with their profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` with `NotFound` if the account is gone.
    pub async fn account(&self, user_id: UserId) -> Result<Account, AuthError> {
        self.users
            .get_account(user_id)
            .await?
            .ok_or(AuthError::Repository(RepositoryError::NotFound))
    }

    /// Apply profile edits.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmailTaken` if another user has the email.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Account, AuthError> {
        if let Some(email) = &update.email
            && self.users.email_taken(email, Some(user_id)).await?
        {
            return Err(ValidationError::EmailTaken.into());
        }

        if !update.is_empty() {
            self.users
                .update_profile(user_id, update)
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(_) => {
                        AuthError::Validation(ValidationError::EmailTaken)
                    }
                    other => AuthError::Repository(other),
                })?;
        }

        self.account(user_id).await
    }
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
