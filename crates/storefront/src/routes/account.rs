//! Account route handlers (requires auth).

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::middleware::RequireAuth;
use crate::models::{Account, ProfileForm};
use crate::routes::{ApiResponse, ApiResult};
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Account,
}

/// POST /account/password
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult {
    AuthService::new(state.pool(), state.email())
        .change_password(
            user.id,
            &req.current_password,
            &req.new_password1,
            &req.new_password2,
        )
        .await?;

    Ok(ApiResponse::message("Password changed"))
}

/// POST /account/profile
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<ProfileForm>,
) -> ApiResult<ProfileResponse> {
    let update = form.validate()?;
    let profile = AuthService::new(state.pool(), state.email())
        .update_profile(user.id, &update)
        .await?;

    let message = if update.is_empty() {
        "Nothing to update"
    } else {
        "Profile updated"
    };
    Ok(ApiResponse::ok(message, ProfileResponse { profile }))
}
