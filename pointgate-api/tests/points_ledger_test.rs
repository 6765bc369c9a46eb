/// Integration tests for the points ledger
///
/// These tests verify the ledger invariants end-to-end against a real
/// database (set TEST_DATABASE_URL):
/// - Balance always equals the sum of transaction deltas
/// - Insufficient balance leaves balance and history untouched
/// - Concurrent consumption cannot drive the balance negative
/// - Recharge pairs the order with exactly one credit transaction
/// - Settlement is idempotent

mod common;

use axum::http::StatusCode;
use common::{unique_action, TestContext};
use pointgate_shared::ledger::PointsLedger;
use pointgate_shared::models::cost_rule::{CreateCostRule, PointsCostRule};
use pointgate_shared::models::points_transaction::PointsTransaction;
use pointgate_shared::models::recharge_plan::{CreateRechargePlan, RechargePlan};
use pointgate_shared::models::user::User;
use serde_json::json;

/// Creates an enabled rule with a unique action, returning the action name
async fn seed_rule(ctx: &TestContext, cost: i64) -> String {
    let action = unique_action("generate_image");
    PointsCostRule::create(
        &ctx.db,
        CreateCostRule {
            action: action.clone(),
            size: "512x512".to_string(),
            feature: "base".to_string(),
            cost,
        },
    )
    .await
    .expect("create cost rule");
    action
}

/// Creates an enabled plan crediting `points`
async fn seed_plan(ctx: &TestContext, points: i64) -> RechargePlan {
    RechargePlan::create(
        &ctx.db,
        CreateRechargePlan {
            name: format!("{} points", points),
            price_cents: 500,
            points,
        },
    )
    .await
    .expect("create recharge plan")
}

/// Asserts the ledger invariant: balance == sum of successful deltas
async fn assert_ledger_invariant(ctx: &TestContext, user_id: uuid::Uuid) {
    let user = User::find_by_id(&ctx.db, user_id).await.unwrap().unwrap();
    let sum = PointsTransaction::sum_for_user(&ctx.db, user_id)
        .await
        .unwrap();
    assert_eq!(
        user.points, sum,
        "balance must equal the sum of transaction deltas"
    );
}

#[tokio::test]
async fn test_consume_decrements_and_records() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let auth = ctx.auth_header(&user);

    let plan = seed_plan(&ctx, 100).await;
    let action = seed_rule(&ctx, 10).await;

    // Fund the account through the recharge endpoint
    let (status, body) = ctx
        .post_json(
            "/v1/points/recharge",
            json!({"plan_id": plan.id}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["remaining"], 100);

    // Two consumptions of 10 each
    for expected_remaining in [90, 80] {
        let (status, body) = ctx
            .post_json(
                "/v1/points/consume",
                json!({"action": &action, "size": "512x512", "feature": "base"}),
                Some(&auth),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
        assert_eq!(body["ok"], true);
        assert_eq!(body["remaining"], expected_remaining);
    }

    let (status, body) = ctx.get("/v1/points/balance", Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 80);

    // History lists all three entries newest first
    let (status, body) = ctx.get("/v1/points/transactions", Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0]["delta"], -10);
    assert_eq!(transactions[2]["delta"], 100);
    assert_eq!(
        transactions[0]["reason"],
        format!("{}_512x512_base", action)
    );

    assert_ledger_invariant(&ctx, user.id).await;
}

#[tokio::test]
async fn test_insufficient_balance_mutates_nothing() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let auth = ctx.auth_header(&user);
    let action = seed_rule(&ctx, 10).await;

    // Fresh account, balance zero
    let (status, body) = ctx
        .post_json(
            "/v1/points/consume",
            json!({"action": &action, "size": "512x512", "feature": "base"}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_balance");

    // No partial mutation: balance unchanged, history empty
    let refreshed = User::find_by_id(&ctx.db, user.id).await.unwrap().unwrap();
    assert_eq!(refreshed.points, 0);

    let history = PointsTransaction::list_by_user(&ctx.db, user.id, 10)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_unknown_rule_is_rejected() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let auth = ctx.auth_header(&user);

    let (status, body) = ctx
        .post_json(
            "/v1/points/consume",
            json!({"action": unique_action("no_such"), "size": "1x1", "feature": "none"}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_concurrent_consume_exactly_one_success() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let auth = ctx.auth_header(&user);

    // Balance 15, cost 10: only one of two concurrent consumptions fits
    let plan = seed_plan(&ctx, 15).await;
    let action = seed_rule(&ctx, 10).await;

    let (status, _) = ctx
        .post_json(
            "/v1/points/recharge",
            json!({"plan_id": plan.id}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let payload = json!({"action": &action, "size": "512x512", "feature": "base"});
    let (r1, r2) = tokio::join!(
        ctx.post_json("/v1/points/consume", payload.clone(), Some(&auth)),
        ctx.post_json("/v1/points/consume", payload.clone(), Some(&auth)),
    );

    let mut statuses = [r1.0, r2.0];
    statuses.sort();
    assert_eq!(
        statuses,
        [StatusCode::OK, StatusCode::BAD_REQUEST],
        "got {:?} and {:?}",
        r1,
        r2
    );

    // The winner saw remaining = 5; the account holds exactly that
    let refreshed = User::find_by_id(&ctx.db, user.id).await.unwrap().unwrap();
    assert_eq!(refreshed.points, 5);

    assert_ledger_invariant(&ctx, user.id).await;
}

#[tokio::test]
async fn test_recharge_pairs_order_and_transaction() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let auth = ctx.auth_header(&user);
    let plan = seed_plan(&ctx, 100).await;

    let (status, body) = ctx
        .post_json(
            "/v1/points/recharge",
            json!({"plan_id": plan.id, "payment_method": "alipay"}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["remaining"], 100);
    let order_id = body["order_id"].as_i64().unwrap();

    // The order settled and carries the requested channel
    let (order_status, channel): (String, String) = sqlx::query_as(
        "SELECT status, channel FROM payment_orders WHERE id = $1",
    )
    .bind(order_id)
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert_eq!(order_status, "success");
    assert_eq!(channel, "alipay");

    // Exactly one credit entry
    let history = PointsTransaction::list_by_user(&ctx.db, user.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].delta, 100);
    assert_eq!(history[0].reason, format!("recharge_{}", plan.id));

    assert_ledger_invariant(&ctx, user.id).await;
}

#[tokio::test]
async fn test_recharge_unknown_plan_is_rejected() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let auth = ctx.auth_header(&user);

    let (status, body) = ctx
        .post_json(
            "/v1/points/recharge",
            json!({"plan_id": -1}),
            Some(&auth),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_settlement_is_idempotent() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let user = ctx.create_email_user("p4ssword!").await;
    let plan = seed_plan(&ctx, 100).await;

    let ledger = PointsLedger::new(ctx.db.clone());
    let outcome = ledger
        .recharge(user.id, plan.id, "wechat")
        .await
        .expect("recharge");
    assert_eq!(outcome.remaining, 100);

    // A second settlement of the same order (gateway retry) credits nothing
    let remaining = ledger
        .settle_order(outcome.order_id, Some("trade-retry-1"))
        .await
        .expect("settle again");
    assert_eq!(remaining, 100);

    let history = PointsTransaction::list_by_user(&ctx.db, user.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    assert_ledger_invariant(&ctx, user.id).await;
}

#[tokio::test]
async fn test_recharge_plan_catalog_lists_enabled_only() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let enabled = seed_plan(&ctx, 100).await;
    let disabled = seed_plan(&ctx, 200).await;
    sqlx::query("UPDATE recharge_plans SET enabled = FALSE WHERE id = $1")
        .bind(disabled.id)
        .execute(&ctx.db)
        .await
        .unwrap();

    let (status, body) = ctx.get("/v1/points/recharge-plans", None).await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<i64> = body["plans"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert!(ids.contains(&enabled.id));
    assert!(!ids.contains(&disabled.id));
}

#[tokio::test]
async fn test_points_endpoints_require_auth() {
    let Some(ctx) = TestContext::try_new().await else { return };

    let (status, _) = ctx.get("/v1/points/balance", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .post_json(
            "/v1/points/consume",
            json!({"action": "a", "size": "s", "feature": "f"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
