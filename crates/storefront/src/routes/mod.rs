//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited except logout and the recovery link)
//! POST /auth/login             - Check password, email a login code
//! POST /auth/login/verify      - Finish login with the code
//! POST /auth/logout            - Log out
//! POST /auth/register          - Create an account and log in
//! POST /auth/recover           - Email a recovery link
//! GET  /auth/recover/{token}   - Check a recovery link
//! POST /auth/recover/{token}   - Set a new password
//!
//! # Account (requires auth)
//! POST /account/password       - Change password
//! POST /account/profile        - Edit profile fields
//!
//! # Cart (requires auth)
//! GET    /cart                 - Lines and totals
//! POST   /cart/add             - Add a product
//! POST   /cart/items/{id}      - Set a line's quantity
//! DELETE /cart/items/{id}      - Remove a line
//! POST   /cart/items/{id}/remove - Remove a line
//! POST   /cart/clear           - Empty the cart
//!
//! # Catalog
//! GET  /products/{id}          - Public product detail with related products
//! GET  /api/stats              - Public store counters
//! GET  /api/products           - Product list (?category=&featured=)
//! GET  /api/products/featured  - Featured products
//! GET  /api/products/{id}      - One product
//! GET  /api/categories         - Category list
//! GET  /api/categories/{id}    - One category
//! POST/PUT/DELETE under /api/products and /api/categories - Admin only
//!
//! # Dashboard (requires auth)
//! GET  /dashboard              - Admin overview or customer storefront
//! GET  /api/me                 - Current profile
//! GET  /api/cart               - Cart totals
//! ```
//!
//! Every handler answers JSON shaped as `{"success": true, "message": ...}`
//! plus handler-specific fields. Failures are rendered by
//! [`AppError`](crate::error::AppError).

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod dashboard;
pub mod products;

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::StorefrontConfig;
use crate::middleware::{auth_rate_limiter, rate_limit_response};
use crate::state::AppState;

/// Success envelope shared by every handler.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

/// Payload for responses that only carry a message.
#[derive(Debug, Default, Serialize)]
pub struct NoData {}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

impl ApiResponse<NoData> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Self::ok(message, NoData {})
    }
}

/// Handler result carrying an [`ApiResponse`].
pub type ApiResult<T = NoData> = crate::error::Result<Json<ApiResponse<T>>>;

/// Create the auth routes router.
///
/// Credential and email-sending endpoints share one per-IP limiter.
pub fn auth_routes(trust_proxy_headers: bool) -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/login/verify", post(auth::verify_login))
        .route("/register", post(auth::register))
        .route("/recover", post(auth::request_recovery))
        .layer(auth_rate_limiter(trust_proxy_headers))
        .layer(middleware::map_response(rate_limit_response));

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
        .route(
            "/recover/{token}",
            get(auth::check_recovery).post(auth::reset_password),
        )
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/password", post(account::change_password))
        .route("/profile", post(account::update_profile))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/items/{id}", post(cart::update).delete(cart::remove))
        .route("/items/{id}/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard::stats))
        .route("/me", get(dashboard::me))
        .route("/cart", get(dashboard::cart_totals))
        .route("/products", get(products::list).post(products::create))
        .route("/products/featured", get(products::featured))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
}

/// Create all routes for the storefront.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/products/{id}", get(products::detail))
        .nest("/auth", auth_routes(config.trusted_proxy))
        .nest("/account", account_routes())
        .nest("/cart", cart_routes())
        .nest("/api", api_routes())
}
