//! Authentication extractors and session helpers.
//!
//! [`RequireAuth`] reads the logged-in user from the session. [`RequireAdmin`]
//! additionally re-reads the role from the database so a demotion takes
//! effect without waiting for the session to expire.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{CurrentUser, PendingLogin, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let user: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Login required".to_owned()))?;

        Ok(Self(user))
    }
}

/// Extractor that requires a logged-in administrator.
///
/// The role stored in the session is only a hint; the profile row decides.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(mut user) = RequireAuth::from_request_parts(parts, state).await?;

        let role = UserRepository::new(state.pool())
            .get_role(user.id)
            .await?
            .unwrap_or_default();
        if !role.is_admin() {
            tracing::warn!(user_id = %user.id, "Non-admin attempted an admin action");
            return Err(AppError::Forbidden("Administrator access required".to_owned()));
        }

        user.role = role;
        Ok(Self(user))
    }
}

/// Log a user in, replacing any earlier identity and pending login.
///
/// The session id is cycled to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .remove::<PendingLogin>(session_keys::PENDING_LOGIN)
        .await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remember a login that passed the password check.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_pending_login(
    session: &Session,
    pending: PendingLogin,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::PENDING_LOGIN, pending).await
}

/// The login waiting for its code, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn pending_login(
    session: &Session,
) -> Result<Option<PendingLogin>, tower_sessions::session::Error> {
    session.get(session_keys::PENDING_LOGIN).await
}

/// Drop the login waiting for its code.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_pending_login(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<PendingLogin>(session_keys::PENDING_LOGIN)
        .await
        .map(|_| ())
}

/// Log out by discarding the whole session.
///
/// # Errors
///
/// Returns an error if the session cannot be deleted.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
