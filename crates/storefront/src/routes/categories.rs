//! Category route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use gamerly_core::{Category, CategoryDraft, CategoryId};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::routes::products::audience_of;
use crate::routes::{ApiResponse, ApiResult};
use crate::services::CatalogService;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct CategoryBody {
    pub category: Category,
}

/// GET /api/categories
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<CategoryList> {
    let audience = audience_of(&state, &user).await?;
    let categories = CatalogService::new(state.pool())
        .categories(audience)
        .await?;
    Ok(ApiResponse::ok("Categories loaded", CategoryList { categories }))
}

/// GET /api/categories/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CategoryId>,
) -> ApiResult<CategoryBody> {
    let audience = audience_of(&state, &user).await?;
    let category = CatalogService::new(state.pool())
        .category(id, audience)
        .await?;
    Ok(ApiResponse::ok("Category loaded", CategoryBody { category }))
}

/// POST /api/categories
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(draft): Json<CategoryDraft>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryBody>>)> {
    let category = CatalogService::new(state.pool())
        .create_category(draft)
        .await?;

    tracing::info!(category_id = %category.id, "Category created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            format!("Category \"{}\" created", category.name),
            CategoryBody { category },
        ),
    ))
}

/// PUT /api/categories/{id}
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(draft): Json<CategoryDraft>,
) -> ApiResult<CategoryBody> {
    let category = CatalogService::new(state.pool())
        .update_category(id, draft)
        .await?;
    Ok(ApiResponse::ok(
        format!("Category \"{}\" updated", category.name),
        CategoryBody { category },
    ))
}

/// DELETE /api/categories/{id}
///
/// Products in the category are deleted with it.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> ApiResult {
    CatalogService::new(state.pool()).delete_category(id).await?;

    tracing::info!(category_id = %id, "Category deleted");
    Ok(ApiResponse::message("Category deleted"))
}
