/// Superuser management endpoints
///
/// JSON management surface for operators: accounts, points cost rules,
/// recharge plans, and payment orders. All routes sit behind the bearer
/// auth layer plus the superuser gate (see `app.rs`); there is no HTML
/// admin panel here.
///
/// # Endpoints
///
/// - `GET /v1/admin/users` - List accounts
/// - `GET /v1/admin/points/rules` - List cost rules (incl. disabled)
/// - `POST /v1/admin/points/rules` - Create a cost rule
/// - `PATCH /v1/admin/points/rules/:id` - Enable/disable a rule
/// - `GET /v1/admin/recharge-plans` - List plans (incl. disabled)
/// - `POST /v1/admin/recharge-plans` - Create a plan
/// - `GET /v1/admin/orders` - List payment orders

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::OkResponse,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use pointgate_shared::models::{
    cost_rule::{CreateCostRule, PointsCostRule},
    payment_order::PaymentOrder,
    recharge_plan::{CreateRechargePlan, RechargePlan},
    user::User,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default page size for admin listings
const DEFAULT_PAGE_SIZE: i64 = 50;

/// Hard cap on admin page size
const MAX_PAGE_SIZE: i64 = 500;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Maximum rows to return (default 50, capped at 500)
    pub limit: Option<i64>,

    /// Rows to skip
    pub offset: Option<i64>,
}

impl PageQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Account listing response
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    /// One page of accounts
    pub users: Vec<User>,

    /// Total number of accounts
    pub total: i64,
}

/// Cost rule creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRuleRequest {
    /// Action being charged
    #[validate(length(min = 1, message = "action must not be empty"))]
    pub action: String,

    /// Size variant
    #[validate(length(min = 1, message = "size must not be empty"))]
    pub size: String,

    /// Feature tier
    #[validate(length(min = 1, message = "feature must not be empty"))]
    pub feature: String,

    /// Cost in points
    #[validate(range(min = 0, message = "cost must not be negative"))]
    pub cost: i64,
}

/// Cost rule update request
#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    /// New enabled state
    pub enabled: bool,
}

/// Plan creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    /// Display name
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    /// Price in cents
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price_cents: i64,

    /// Points credited on settlement
    #[validate(range(min = 0, message = "points must not be negative"))]
    pub points: i64,
}

/// Lists accounts with pagination
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<UsersResponse>> {
    let users = User::list(&state.db, page.limit(), page.offset()).await?;
    let total = User::count(&state.db).await?;

    Ok(Json(UsersResponse { users, total }))
}

/// Lists all cost rules, enabled and disabled
pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<Vec<PointsCostRule>>> {
    Ok(Json(PointsCostRule::list(&state.db).await?))
}

/// Creates an enabled cost rule
///
/// # Errors
///
/// - `409 Conflict`: an enabled rule for the same triple already exists
pub async fn create_rule(
    State(state): State<AppState>,
    Json(req): Json<CreateRuleRequest>,
) -> ApiResult<Json<PointsCostRule>> {
    req.validate()?;

    let rule = PointsCostRule::create(
        &state.db,
        CreateCostRule {
            action: req.action,
            size: req.size,
            feature: req.feature,
            cost: req.cost,
        },
    )
    .await?;

    Ok(Json(rule))
}

/// Enables or disables a cost rule
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRuleRequest>,
) -> ApiResult<Json<OkResponse>> {
    if !PointsCostRule::set_enabled(&state.db, id, req.enabled).await? {
        return Err(ApiError::NotFound(format!("cost rule {} not found", id)));
    }

    Ok(Json(OkResponse::new()))
}

/// Lists all recharge plans, enabled and disabled
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<RechargePlan>>> {
    Ok(Json(RechargePlan::list(&state.db).await?))
}

/// Creates an enabled recharge plan
pub async fn create_plan(
    State(state): State<AppState>,
    Json(req): Json<CreatePlanRequest>,
) -> ApiResult<Json<RechargePlan>> {
    req.validate()?;

    let plan = RechargePlan::create(
        &state.db,
        CreateRechargePlan {
            name: req.name,
            price_cents: req.price_cents,
            points: req.points,
        },
    )
    .await?;

    Ok(Json(plan))
}

/// Lists payment orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<PaymentOrder>>> {
    Ok(Json(
        PaymentOrder::list(&state.db, page.limit(), page.offset()).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_caps() {
        let page = PageQuery {
            limit: None,
            offset: None,
        };
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = PageQuery {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_create_rule_request_validation() {
        let req = CreateRuleRequest {
            action: "generate_image".to_string(),
            size: "512x512".to_string(),
            feature: "base".to_string(),
            cost: -1,
        };
        assert!(req.validate().is_err());
    }
}
