//! End-to-end tests for the GAMERLY storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Apply migrations and start the server with the console email backend
//! cargo run -p gamerly-cli -- migrate
//! EMAIL_BACKEND=console STOREFRONT_TRUSTED_PROXY=true cargo run -p gamerly-storefront
//!
//! # Run the ignored end-to-end tests
//! cargo test -p gamerly-integration-tests -- --ignored
//! ```
//!
//! Tests talk to the server over HTTP and use the same database for setup
//! that is awkward through the API: emailed codes, admin roles and catalog
//! rows.
//!
//! - `STOREFRONT_TEST_URL` - server base URL (default `http://localhost:3000`)
//! - `STOREFRONT_DATABASE_URL` or `DATABASE_URL` - the server's database
//!
//! The server must run with `STOREFRONT_TRUSTED_PROXY=true`. Clients send a
//! random `X-Forwarded-For` address, and the auth rate limiter only reads it
//! in that mode.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use gamerly_core::{
    CategoryDraft, CategoryId, Money, ProductDraft, ProductId, ProductStatus, UserId, UserRole,
};
use gamerly_storefront::db::{CatalogRepository, UserRepository};
use gamerly_storefront::services::TokenService;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "hunter2-but-longer";

/// Base URL for the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned())
}

/// Short unique suffix so parallel tests never collide.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", id.get(..10).unwrap_or(&id))
}

/// Client with its own cookie jar and its own forwarded address, so each
/// client gets a separate auth rate-limit bucket on a server that trusts
/// proxy headers.
#[must_use]
pub fn new_client() -> Client {
    let bytes = Uuid::new_v4().into_bytes();
    let forwarded = format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]);

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&forwarded).expect("valid header"),
    );

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Decode a JSON response, asserting its status.
pub async fn expect_json(resp: Response, status: StatusCode) -> Value {
    let actual = resp.status();
    let body: Value = resp.json().await.expect("Response was not JSON");
    assert_eq!(actual, status, "unexpected status, body: {body}");
    body
}

/// A logged-in user with their own session.
pub struct TestUser {
    pub client: Client,
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Shared handles for a test.
pub struct TestContext {
    pub base_url: String,
    pub pool: PgPool,
}

impl TestContext {
    /// Connect to the storefront database.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("STOREFRONT_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("STOREFRONT_DATABASE_URL or DATABASE_URL must be set");
        let pool = gamerly_storefront::db::create_pool(&SecretString::from(database_url))
            .await
            .expect("Failed to connect to the storefront database");

        Self {
            base_url: storefront_base_url(),
            pool,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register a fresh customer through the API. Registration logs in.
    pub async fn register_customer(&self) -> TestUser {
        let client = new_client();
        let username = unique("player");
        let email = format!("{username}@example.com");

        let resp = client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "email": email,
                "first_name": "Test",
                "last_name": "Player",
                "password1": TEST_PASSWORD,
                "password2": TEST_PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to register");
        let body = expect_json(resp, StatusCode::OK).await;
        let id = body["user"]["id"].as_i64().expect("user id in response");

        TestUser {
            client,
            id: UserId::new(i32::try_from(id).expect("id fits i32")),
            username,
            email,
        }
    }

    /// Register a customer and give them the admin role.
    pub async fn register_admin(&self) -> TestUser {
        let user = self.register_customer().await;
        UserRepository::new(&self.pool)
            .set_role(&user.username, UserRole::Admin)
            .await
            .expect("Failed to promote test admin");
        user
    }

    /// Replace the user's emailed login code with a known one.
    pub async fn known_login_code(&self, user_id: UserId) -> String {
        TokenService::new(&self.pool)
            .issue_login_code(user_id)
            .await
            .expect("Failed to issue login code")
    }

    /// Issue a recovery token directly.
    pub async fn recovery_token(&self, user_id: UserId) -> String {
        TokenService::new(&self.pool)
            .issue_recovery_token(user_id)
            .await
            .expect("Failed to issue recovery token")
    }

    /// Create an active category with a unique name.
    pub async fn create_category(&self) -> CategoryId {
        CatalogRepository::new(&self.pool)
            .create_category(&CategoryDraft {
                name: unique("Category"),
                description: String::new(),
                active: true,
            })
            .await
            .expect("Failed to create category")
            .id
    }

    /// Create a product priced in cents.
    pub async fn create_product(
        &self,
        category_id: CategoryId,
        price_cents: i64,
        stock: i64,
        status: ProductStatus,
    ) -> ProductId {
        let input = ProductDraft {
            name: unique("Game"),
            description: "Test product".to_owned(),
            price: Money::from_minor(price_cents),
            sale_price: None,
            category_id,
            stock,
            status,
            featured: false,
        }
        .validate()
        .expect("valid product");

        CatalogRepository::new(&self.pool)
            .create_product(&input, None)
            .await
            .expect("Failed to create product")
            .id
    }

    /// Set or clear a product's sale price.
    pub async fn set_sale_price(&self, product_id: ProductId, sale_cents: Option<i64>) {
        sqlx::query("UPDATE storefront.product SET sale_cents = $2 WHERE id = $1")
            .bind(product_id)
            .bind(sale_cents)
            .execute(&self.pool)
            .await
            .expect("Failed to update sale price");
    }
}

impl TestUser {
    /// POST /cart/add as this user.
    pub async fn add_to_cart(
        &self,
        ctx: &TestContext,
        product_id: ProductId,
        quantity: i64,
    ) -> Response {
        self.client
            .post(ctx.url("/cart/add"))
            .json(&json!({"product_id": product_id, "quantity": quantity}))
            .send()
            .await
            .expect("Failed to add to cart")
    }

    /// The current cart.
    pub async fn cart(&self, ctx: &TestContext) -> Value {
        let resp = self
            .client
            .get(ctx.url("/cart"))
            .send()
            .await
            .expect("Failed to load cart");
        expect_json(resp, StatusCode::OK).await
    }
}
