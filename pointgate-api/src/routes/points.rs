/// Points endpoints
///
/// Thin handlers over the [`PointsLedger`]: balance lookup, consumption,
/// transaction history, the public recharge-plan catalog, and the recharge
/// workflow.
///
/// # Endpoints
///
/// - `GET /v1/points/balance` - Current balance (authenticated)
/// - `POST /v1/points/consume` - Charge for an action (authenticated)
/// - `GET /v1/points/transactions` - Ledger history (authenticated)
/// - `GET /v1/points/recharge-plans` - Enabled plans (public)
/// - `POST /v1/points/recharge` - Purchase points (authenticated)

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pointgate_shared::models::user::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default number of transactions returned by the history endpoint
const DEFAULT_TRANSACTION_LIMIT: i64 = 50;

/// Hard cap on the history page size
const MAX_TRANSACTION_LIMIT: i64 = 200;

/// Consume request: the (action, size, feature) rule triple
#[derive(Debug, Deserialize, Validate)]
pub struct ConsumeRequest {
    /// Action being performed, e.g. "generate_image"
    #[validate(length(min = 1, message = "action must not be empty"))]
    pub action: String,

    /// Size variant, e.g. "512x512"
    #[validate(length(min = 1, message = "size must not be empty"))]
    pub size: String,

    /// Feature tier, e.g. "base"
    #[validate(length(min = 1, message = "feature must not be empty"))]
    pub feature: String,
}

/// Consume response
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    /// Always true; failures are reported as errors
    pub ok: bool,

    /// Balance after the charge
    pub remaining: i64,
}

/// Balance response
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current points balance
    pub balance: i64,
}

/// Transaction history query parameters
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// Maximum entries to return (default 50, capped at 200)
    pub limit: Option<i64>,
}

/// A single history entry as returned to clients
#[derive(Debug, Serialize)]
pub struct TransactionView {
    /// Entry id
    pub id: i64,

    /// Signed balance change
    pub delta: i64,

    /// What caused the change
    pub reason: String,

    /// Entry status
    pub status: String,

    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

/// Transaction history response
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    /// Entries, newest first
    pub transactions: Vec<TransactionView>,
}

/// A recharge plan as returned to clients
#[derive(Debug, Serialize)]
pub struct PlanView {
    /// Plan id
    pub id: i64,

    /// Display name
    pub name: String,

    /// Price in cents
    pub price_cents: i64,

    /// Points credited on purchase
    pub points: i64,
}

/// Recharge plan catalog response
#[derive(Debug, Serialize)]
pub struct PlansResponse {
    /// Enabled plans, cheapest first
    pub plans: Vec<PlanView>,
}

/// Recharge request
#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    /// Plan to purchase
    pub plan_id: i64,

    /// Payment channel
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_payment_method() -> String {
    "wechat".to_string()
}

/// Recharge response
#[derive(Debug, Serialize)]
pub struct RechargeResponse {
    /// Always true; failures are reported as errors
    pub ok: bool,

    /// Id of the created (and settled) payment order
    pub order_id: i64,

    /// Balance after the credit
    pub remaining: i64,
}

/// Returns the current points balance
pub async fn balance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.ledger.balance(user.id).await?;

    Ok(Json(BalanceResponse { balance }))
}

/// Charges the account for an action
///
/// # Errors
///
/// - `400 Bad Request`: no enabled rule for the triple, or insufficient balance
pub async fn consume(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ConsumeRequest>,
) -> ApiResult<Json<ConsumeResponse>> {
    req.validate()?;

    let outcome = state
        .ledger
        .consume(user.id, &req.action, &req.size, &req.feature)
        .await?;

    Ok(Json(ConsumeResponse {
        ok: true,
        remaining: outcome.remaining,
    }))
}

/// Lists the account's ledger history, newest first
pub async fn transactions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult<Json<TransactionsResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
        .clamp(1, MAX_TRANSACTION_LIMIT);

    let transactions = state
        .ledger
        .transactions(user.id, limit)
        .await?
        .into_iter()
        .map(|t| TransactionView {
            id: t.id,
            delta: t.delta,
            reason: t.reason,
            status: t.status,
            created_at: t.created_at,
        })
        .collect();

    Ok(Json(TransactionsResponse { transactions }))
}

/// Lists the enabled recharge plans
pub async fn recharge_plans(State(state): State<AppState>) -> ApiResult<Json<PlansResponse>> {
    let plans = state
        .ledger
        .plans()
        .await?
        .into_iter()
        .map(|p| PlanView {
            id: p.id,
            name: p.name,
            price_cents: p.price_cents,
            points: p.points,
        })
        .collect();

    Ok(Json(PlansResponse { plans }))
}

/// Purchases a recharge plan
///
/// Creates a payment order and settles it. With no payment gateway wired
/// up, settlement is immediate; the order id is returned so a future
/// gateway integration can settle asynchronously instead.
///
/// # Errors
///
/// - `400 Bad Request`: unknown or disabled plan
pub async fn recharge(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<RechargeRequest>,
) -> ApiResult<Json<RechargeResponse>> {
    let outcome = state
        .ledger
        .recharge(user.id, req.plan_id, &req.payment_method)
        .await?;

    Ok(Json(RechargeResponse {
        ok: true,
        order_id: outcome.order_id,
        remaining: outcome.remaining,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_payment_method() {
        let req: RechargeRequest = serde_json::from_str(r#"{"plan_id": 1}"#).unwrap();
        assert_eq!(req.payment_method, "wechat");
    }

    #[test]
    fn test_consume_request_rejects_empty_fields() {
        let req = ConsumeRequest {
            action: String::new(),
            size: "512x512".to_string(),
            feature: "base".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
