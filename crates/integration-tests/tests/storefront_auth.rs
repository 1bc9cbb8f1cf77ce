//! End-to-end tests for registration, two-step login and password recovery.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`gamerly-cli migrate`)
//! - The storefront server running with `EMAIL_BACKEND=console` and
//!   `STOREFRONT_TRUSTED_PROXY=true`
//!
//! Run with: cargo test -p gamerly-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::json;
use tokio::task::JoinSet;

use gamerly_integration_tests::{TEST_PASSWORD, TestContext, expect_json, new_client};
use gamerly_storefront::services::TokenService;

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let client = new_client();

    let resp = client.get(ctx.url("/health")).send().await.unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["success"], true);

    let resp = client.get(ctx.url("/health/ready")).send().await.unwrap();
    expect_json(resp, StatusCode::OK).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_logs_in() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;

    let resp = user.client.get(ctx.url("/api/me")).send().await.unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["username"], user.username.as_str());
    assert_eq!(body["email"], user.email.as_str());
    assert_eq!(body["full_name"], "Test Player");
    assert_eq!(body["role"], "customer");

    // A new account starts with an empty cart.
    let resp = user.client.get(ctx.url("/api/cart")).send().await.unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["cart"]["item_count"], 0);
    assert_eq!(body["cart"]["total"], "0.00");
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_rejects_duplicates_and_bad_passwords() {
    let ctx = TestContext::new().await;
    let existing = ctx.register_customer().await;
    let client = new_client();

    let form = |username: &str, email: &str, p1: &str, p2: &str| {
        json!({
            "username": username,
            "email": email,
            "first_name": "Dup",
            "last_name": "User",
            "password1": p1,
            "password2": p2,
        })
    };

    let cases = [
        (
            form(&existing.username, "fresh@example.com", TEST_PASSWORD, TEST_PASSWORD),
            "username is already taken",
        ),
        (
            form("fresh_name_1", &existing.email, TEST_PASSWORD, TEST_PASSWORD),
            "email is already registered",
        ),
        (
            form("fresh_name_2", "fresh2@example.com", "short", "short"),
            "password must be at least 8 characters",
        ),
        (
            form("fresh_name_3", "fresh3@example.com", TEST_PASSWORD, "different-pass"),
            "passwords do not match",
        ),
    ];

    for (payload, message) in cases {
        let resp = client
            .post(ctx.url("/auth/register"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        let body = expect_json(resp, StatusCode::BAD_REQUEST).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], message);
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_login_requires_emailed_code() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;
    let client = new_client();

    // Wrong password
    let resp = client
        .post(ctx.url("/auth/login"))
        .json(&json!({"username": user.username, "password": "not-the-password"}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::UNAUTHORIZED).await;

    // Password accepted, code pending
    let resp = client
        .post(ctx.url("/auth/login"))
        .json(&json!({"username": user.username, "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["requires_code"], true);

    // Not logged in yet
    let resp = client.get(ctx.url("/api/me")).send().await.unwrap();
    expect_json(resp, StatusCode::UNAUTHORIZED).await;

    let code = ctx.known_login_code(user.id).await;

    let resp = client
        .post(ctx.url("/auth/login/verify"))
        .json(&json!({"code": "000000"}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::NOT_FOUND).await;

    let resp = client
        .post(ctx.url("/auth/login/verify"))
        .json(&json!({"code": code}))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["user"]["username"], user.username.as_str());

    let resp = client.get(ctx.url("/api/me")).send().await.unwrap();
    expect_json(resp, StatusCode::OK).await;

    // Logging out ends the session.
    let resp = client.post(ctx.url("/auth/logout")).send().await.unwrap();
    expect_json(resp, StatusCode::OK).await;
    let resp = client.get(ctx.url("/api/me")).send().await.unwrap();
    expect_json(resp, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_verify_without_pending_login_fails() {
    let ctx = TestContext::new().await;
    let client = new_client();

    let resp = client
        .post(ctx.url("/auth/login/verify"))
        .json(&json!({"code": "123456"}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_recovery_does_not_reveal_accounts() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;
    let client = new_client();

    let known = client
        .post(ctx.url("/auth/recover"))
        .json(&json!({"email_or_username": user.email}))
        .send()
        .await
        .unwrap();
    let known = expect_json(known, StatusCode::OK).await;

    let unknown = client
        .post(ctx.url("/auth/recover"))
        .json(&json!({"email_or_username": "nobody-here@example.com"}))
        .send()
        .await
        .unwrap();
    let unknown = expect_json(unknown, StatusCode::OK).await;

    assert_eq!(known, unknown);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_recovery_token_is_single_use() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;
    let client = new_client();
    let token = ctx.recovery_token(user.id).await;

    let resp = client
        .get(ctx.url(&format!("/auth/recover/{token}")))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["username"], user.username.as_str());

    let new_password = "brand-new-password";
    let reset = json!({"new_password1": new_password, "new_password2": new_password});

    let resp = client
        .post(ctx.url(&format!("/auth/recover/{token}")))
        .json(&reset)
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;

    let resp = client
        .post(ctx.url(&format!("/auth/recover/{token}")))
        .json(&reset)
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::GONE).await;

    // The new password works for the first login step.
    let resp = client
        .post(ctx.url("/auth/login"))
        .json(&json!({"username": user.username, "password": new_password}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_new_recovery_token_invalidates_previous() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;
    let client = new_client();

    let first = ctx.recovery_token(user.id).await;
    let second = ctx.recovery_token(user.id).await;

    let resp = client
        .get(ctx.url(&format!("/auth/recover/{first}")))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::NOT_FOUND).await;

    let resp = client
        .get(ctx.url(&format!("/auth/recover/{second}")))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_change_password_and_profile() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;

    let resp = user
        .client
        .post(ctx.url("/account/password"))
        .json(&json!({
            "current_password": "wrong-current",
            "new_password1": "another-password",
            "new_password2": "another-password",
        }))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::BAD_REQUEST).await;

    let resp = user
        .client
        .post(ctx.url("/account/password"))
        .json(&json!({
            "current_password": TEST_PASSWORD,
            "new_password1": "another-password",
            "new_password2": "another-password",
        }))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;

    let resp = user
        .client
        .post(ctx.url("/account/profile"))
        .json(&json!({"birth_date": "12/31/1999"}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::BAD_REQUEST).await;

    let resp = user
        .client
        .post(ctx.url("/account/profile"))
        .json(&json!({"phone": "+56 9 5555 0000", "birth_date": "1999-12-31", "last_name": " "}))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["profile"]["profile"]["phone"], "+56 9 5555 0000");
    assert_eq!(body["profile"]["profile"]["birth_date"], "1999-12-31");
    assert_eq!(body["profile"]["last_name"], "Player");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running storefront server and database"]
async fn test_concurrent_login_codes_leave_one_live() {
    let ctx = TestContext::new().await;
    let user = ctx.register_customer().await;
    let user_id = user.id;

    for _ in 0..10 {
        let mut issues = JoinSet::new();
        for _ in 0..8 {
            let pool = ctx.pool.clone();
            issues.spawn(async move {
                TokenService::new(&pool)
                    .issue_login_code(user_id)
                    .await
                    .unwrap()
            });
        }
        while let Some(issued) = issues.join_next().await {
            issued.unwrap();
        }

        let live: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storefront.one_time_token
             WHERE user_id = $1 AND purpose = 'login' AND NOT used",
        )
        .bind(user_id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
        assert_eq!(live, 1);
    }

    // A later issue overwrites the live code.
    let code = ctx.known_login_code(user.id).await;
    let client = new_client();
    let resp = client
        .post(ctx.url("/auth/login"))
        .json(&json!({"username": user.username, "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;
    let resp = client
        .post(ctx.url("/auth/login/verify"))
        .json(&json!({"code": code}))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::NOT_FOUND).await;
}
