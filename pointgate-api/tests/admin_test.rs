/// Integration tests for the superuser management endpoints
///
/// Verifies the authorization gate (plain accounts are rejected) and the
/// rule/plan/order management surface. Set TEST_DATABASE_URL to run.

mod common;

use axum::http::StatusCode;
use common::{unique_action, TestContext};
use pointgate_shared::models::user::User;
use serde_json::json;

/// Promotes an account to superuser
async fn promote(ctx: &TestContext, user: &User) {
    sqlx::query("UPDATE users SET is_superuser = TRUE WHERE id = $1")
        .bind(user.id)
        .execute(&ctx.db)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_admin_requires_superuser() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;

    // Authenticated but not superuser
    let (status, body) = ctx
        .get("/v1/admin/users", Some(&ctx.auth_header(&user)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "unexpected body: {}", body);

    // Unauthenticated
    let (status, _) = ctx.get("/v1/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_users() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let admin = ctx.create_email_user("p4ssword!").await;
    promote(&ctx, &admin).await;

    let (status, body) = ctx
        .get("/v1/admin/users?limit=10", Some(&ctx.auth_header(&admin)))
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert!(body["total"].as_i64().unwrap() >= 1);
    assert!(!body["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_manages_cost_rules() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let admin = ctx.create_email_user("p4ssword!").await;
    promote(&ctx, &admin).await;
    let auth = ctx.auth_header(&admin);

    let action = unique_action("admin_rule");

    // Create
    let (status, body) = ctx
        .post_json(
            "/v1/admin/points/rules",
            json!({"action": &action, "size": "512x512", "feature": "base", "cost": 10}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let rule_id = body["id"].as_i64().unwrap();
    assert_eq!(body["enabled"], true);

    // A second enabled rule for the same triple violates the unique index
    let (status, _) = ctx
        .post_json(
            "/v1/admin/points/rules",
            json!({"action": &action, "size": "512x512", "feature": "base", "cost": 20}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Disable
    let request = axum::http::Request::builder()
        .method("PATCH")
        .uri(format!("/v1/admin/points/rules/{}", rule_id))
        .header("content-type", "application/json")
        .header("authorization", &auth)
        .body(axum::body::Body::from(json!({"enabled": false}).to_string()))
        .unwrap();
    let (status, _) = ctx.send(request).await;
    assert_eq!(status, StatusCode::OK);

    // A disabled rule no longer matches consumption
    let user = ctx.create_email_user("p4ssword!").await;
    let (status, body) = ctx
        .post_json(
            "/v1/points/consume",
            json!({"action": &action, "size": "512x512", "feature": "base"}),
            Some(&ctx.auth_header(&user)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_admin_creates_plans_and_sees_orders() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let admin = ctx.create_email_user("p4ssword!").await;
    promote(&ctx, &admin).await;
    let auth = ctx.auth_header(&admin);

    let (status, body) = ctx
        .post_json(
            "/v1/admin/recharge-plans",
            json!({"name": "Test pack", "price_cents": 500, "points": 100}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let plan_id = body["id"].as_i64().unwrap();

    // Purchase it as a regular user, then find the order in the admin view
    let buyer = ctx.create_email_user("p4ssword!").await;
    let (status, body) = ctx
        .post_json(
            "/v1/points/recharge",
            json!({"plan_id": plan_id}),
            Some(&ctx.auth_header(&buyer)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["order_id"].as_i64().unwrap();

    let (status, body) = ctx
        .get("/v1/admin/orders?limit=100", Some(&auth))
        .await;
    assert_eq!(status, StatusCode::OK);
    let found = body
        .as_array()
        .unwrap()
        .iter()
        .any(|o| o["id"].as_i64() == Some(order_id) && o["status"] == "success");
    assert!(found, "order {} should appear in the admin list", order_id);
}
