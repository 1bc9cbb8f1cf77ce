//! Authentication route handlers.
//!
//! Password login is a two-step flow: the password check emails a one-time
//! code and parks the user in the session as a pending login; the code then
//! completes it. Too many wrong codes drop the pending login, so a fresh code
//! needs the password again. Registration logs in directly.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use gamerly_core::TokenError;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    clear_current_user, clear_pending_login, pending_login, set_current_user, set_pending_login,
};
use crate::models::{Account, CurrentUser, PendingLogin};
use crate::routes::{ApiResponse, ApiResult};
use crate::services::{AuthError, AuthService, Registration};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyLoginRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    #[serde(default)]
    pub email_or_username: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginStarted {
    pub requires_code: bool,
}

#[derive(Debug, Serialize)]
pub struct LoggedIn {
    pub user: CurrentUser,
}

#[derive(Debug, Serialize)]
pub struct RecoveryLink {
    pub username: String,
}

async fn log_in(session: &Session, account: &Account) -> Result<CurrentUser> {
    let user = CurrentUser::from(account);
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(&user.username));
    Ok(user)
}

// =============================================================================
// Login
// =============================================================================

/// POST /auth/login
#[instrument(skip(state, session, req), fields(username = %req.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginStarted> {
    let account = AuthService::new(state.pool(), state.email())
        .start_login(&req.username, &req.password)
        .await?;

    set_pending_login(&session, PendingLogin::new(account.user.id)).await?;

    Ok(ApiResponse::ok(
        "A login code was sent to your email",
        LoginStarted {
            requires_code: true,
        },
    ))
}

/// POST /auth/login/verify
#[instrument(skip(state, session, req))]
pub async fn verify_login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<VerifyLoginRequest>,
) -> ApiResult<LoggedIn> {
    let pending = pending_login(&session)
        .await?
        .ok_or(AuthError::NoPendingLogin)?;

    let result = AuthService::new(state.pool(), state.email())
        .finish_login(pending.user_id, &req.code)
        .await;
    let account = match result {
        Err(AuthError::Token(TokenError::NotFound)) => {
            if let Some(next) = pending.after_wrong_code() {
                set_pending_login(&session, next).await?;
            } else {
                clear_pending_login(&session).await?;
                tracing::warn!(user_id = %pending.user_id, "Login code attempts exhausted");
            }
            return Err(AuthError::Token(TokenError::NotFound).into());
        }
        other => other?,
    };
    let user = log_in(&session, &account).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    add_breadcrumb("auth", "Login completed", None);
    Ok(ApiResponse::ok(
        format!("Welcome back, {}", account.user.full_name()),
        LoggedIn { user },
    ))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> ApiResult {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(ApiResponse::message("Logged out"))
}

// =============================================================================
// Registration
// =============================================================================

/// POST /auth/register
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<Registration>,
) -> ApiResult<LoggedIn> {
    let account = AuthService::new(state.pool(), state.email())
        .register(&form)
        .await?;
    let user = log_in(&session, &account).await?;

    tracing::info!(user_id = %user.id, "Account registered");
    Ok(ApiResponse::ok(
        format!("Welcome to GAMERLY, {}", account.user.full_name()),
        LoggedIn { user },
    ))
}

// =============================================================================
// Password Recovery
// =============================================================================

/// POST /auth/recover
///
/// Answers the same way whether or not the account exists.
#[instrument(skip(state, req))]
pub async fn request_recovery(
    State(state): State<AppState>,
    Json(req): Json<RecoveryRequest>,
) -> ApiResult {
    let config = state.config();
    AuthService::new(state.pool(), state.email())
        .request_recovery(&req.email_or_username, |token| config.recovery_url(token))
        .await?;

    Ok(ApiResponse::message(
        "If the account exists, a recovery link was sent to its email",
    ))
}

/// GET /auth/recover/{token}
pub async fn check_recovery(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<RecoveryLink> {
    let user = AuthService::new(state.pool(), state.email())
        .check_recovery(&token)
        .await?;

    Ok(ApiResponse::ok(
        "Recovery link is valid",
        RecoveryLink {
            username: user.username,
        },
    ))
}

/// POST /auth/recover/{token}
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult {
    let user_id = AuthService::new(state.pool(), state.email())
        .reset_password(&token, &req.new_password1, &req.new_password2)
        .await?;

    tracing::info!(user_id = %user_id, "Password reset through recovery link");
    Ok(ApiResponse::message("Password updated, you can now log in"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_login_fields_default_to_empty() {
        let req: LoginRequest = serde_json::from_str(r#"{"username": "player1"}"#).unwrap();
        assert_eq!(req.username, "player1");
        assert!(req.password.is_empty());
    }

    #[test]
    fn test_login_started_body() {
        let Json(body) = ApiResponse::ok(
            "sent",
            LoginStarted {
                requires_code: true,
            },
        );
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["requires_code"], true);
        assert_eq!(json["success"], true);
    }
}
