//! Dashboard and profile handlers.
//!
//! `/dashboard` answers with one of two shapes, tagged by `view`: the admin
//! inventory overview, or the customer's paginated storefront.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use gamerly_core::{Category, CartTotals, UserRole};

use crate::db::catalog::StoreStats;
use crate::middleware::RequireAuth;
use crate::models::Account;
use crate::routes::products::audience_of;
use crate::routes::{ApiResponse, ApiResult};
use crate::services::catalog::{AdminOverview, Audience, ProductPage, parse_category};
use crate::services::{AuthService, CartService, CatalogService};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub page: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerDashboard {
    #[serde(flatten)]
    pub listing: ProductPage,
    pub categories: Vec<Category>,
    pub cart: CartTotals,
}

#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    Admin(AdminOverview),
    Customer(CustomerDashboard),
}

#[derive(Debug, Serialize)]
pub struct Me {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub profile: Account,
}

#[derive(Debug, Serialize)]
pub struct CartSummary {
    pub cart: CartTotals,
}

/// GET /dashboard?page=&category=
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Dashboard> {
    let catalog = CatalogService::new(state.pool());

    if audience_of(&state, &user).await? == Audience::Admin {
        let overview = catalog.admin_overview().await?;
        return Ok(ApiResponse::ok(
            "Admin dashboard loaded",
            Dashboard::Admin(overview),
        ));
    }

    let listing = catalog
        .browse(
            query.page.as_deref(),
            parse_category(query.category.as_deref()),
        )
        .await?;
    let categories = catalog.categories(Audience::Public).await?;
    let cart = CartService::new(state.pool()).totals(user.id).await?;

    Ok(ApiResponse::ok(
        format!("Welcome, {}", user.username),
        Dashboard::Customer(CustomerDashboard {
            listing,
            categories,
            cart,
        }),
    ))
}

/// GET /api/me
pub async fn me(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> ApiResult<Me> {
    let account = AuthService::new(state.pool(), state.email())
        .account(user.id)
        .await?;

    Ok(ApiResponse::ok(
        "Profile loaded",
        Me {
            username: account.user.username.clone(),
            email: account.user.email.as_str().to_owned(),
            full_name: account.user.full_name(),
            role: account.profile.role,
            profile: account,
        },
    ))
}

/// GET /api/cart
pub async fn cart_totals(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<CartSummary> {
    let cart = CartService::new(state.pool()).totals(user.id).await?;
    Ok(ApiResponse::ok("Cart totals loaded", CartSummary { cart }))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<StoreStats> {
    let stats = CatalogService::new(state.pool()).store_stats().await?;
    Ok(ApiResponse::ok("Store stats loaded", stats))
}
