//! Product route handlers.
//!
//! The product page is public. The JSON listing needs a login, and only
//! administrators may change the catalog or see unavailable products.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gamerly_core::{Product, ProductDraft, ProductId};

use crate::db::UserRepository;
use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::{ApiResponse, ApiResult};
use crate::services::CatalogService;
use crate::services::catalog::{Audience, ProductDetail, parse_category, parse_flag};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub featured: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub count: usize,
    pub products: Vec<Product>,
}

impl From<Vec<Product>> for ProductList {
    fn from(products: Vec<Product>) -> Self {
        Self {
            count: products.len(),
            products,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

/// Catalog visibility for a logged-in user, using the stored role.
pub(crate) async fn audience_of(state: &AppState, user: &CurrentUser) -> Result<Audience> {
    let role = UserRepository::new(state.pool())
        .get_role(user.id)
        .await?
        .unwrap_or_default();
    Ok(Audience::for_admin(role.is_admin()))
}

/// GET /products/{id}
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> ApiResult<ProductDetail> {
    let detail = CatalogService::new(state.pool()).product_detail(id).await?;
    Ok(ApiResponse::ok("Product loaded", detail))
}

/// GET /api/products?category=&featured=
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ProductList> {
    let audience = audience_of(&state, &user).await?;
    let products = CatalogService::new(state.pool())
        .products(
            audience,
            parse_category(query.category.as_deref()),
            parse_flag(query.featured.as_deref()),
        )
        .await?;
    Ok(ApiResponse::ok("Products loaded", products.into()))
}

/// GET /api/products/featured
pub async fn featured(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> ApiResult<ProductList> {
    let products = CatalogService::new(state.pool()).featured().await?;
    Ok(ApiResponse::ok("Featured products loaded", products.into()))
}

/// GET /api/products/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
) -> ApiResult<ProductBody> {
    let audience = audience_of(&state, &user).await?;
    let product = CatalogService::new(state.pool())
        .product(id, audience)
        .await?;
    Ok(ApiResponse::ok("Product loaded", ProductBody { product }))
}

/// POST /api/products
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<ApiResponse<ProductBody>>)> {
    let product = CatalogService::new(state.pool())
        .create_product(draft, admin.id)
        .await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            format!("Product \"{}\" created", product.name),
            ProductBody { product },
        ),
    ))
}

/// PUT /api/products/{id}
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> ApiResult<ProductBody> {
    let product = CatalogService::new(state.pool())
        .update_product(id, draft)
        .await?;
    Ok(ApiResponse::ok(
        format!("Product \"{}\" updated", product.name),
        ProductBody { product },
    ))
}

/// DELETE /api/products/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> ApiResult {
    CatalogService::new(state.pool()).delete_product(id).await?;

    tracing::info!(product_id = %id, "Product deleted");
    Ok(ApiResponse::message("Product deleted"))
}
