/// Recharge plan model
///
/// A plan is a purchasable points bundle: a price in integer cents and the
/// number of points credited on settlement. Prices are never floats - the
/// whole ledger path is integer arithmetic.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE recharge_plans (
///     id BIGSERIAL PRIMARY KEY,
///     name TEXT NOT NULL,
///     price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
///     points BIGINT NOT NULL CHECK (points >= 0),
///     enabled BOOLEAN NOT NULL DEFAULT TRUE
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

/// A purchasable points bundle
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RechargePlan {
    /// Row id
    pub id: i64,

    /// Display name, e.g. "Starter pack"
    pub name: String,

    /// Price in cents
    pub price_cents: i64,

    /// Points credited when a purchase settles
    pub points: i64,

    /// Whether the plan is offered
    pub enabled: bool,
}

/// Input for creating a recharge plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRechargePlan {
    /// Display name
    pub name: String,

    /// Price in cents
    pub price_cents: i64,

    /// Points credited on settlement
    pub points: i64,
}

impl RechargePlan {
    /// Creates an enabled plan
    pub async fn create(pool: &PgPool, data: CreateRechargePlan) -> Result<Self, sqlx::Error> {
        let plan = sqlx::query_as::<_, RechargePlan>(
            r#"
            INSERT INTO recharge_plans (name, price_cents, points)
            VALUES ($1, $2, $3)
            RETURNING id, name, price_cents, points, enabled
            "#,
        )
        .bind(data.name)
        .bind(data.price_cents)
        .bind(data.points)
        .fetch_one(pool)
        .await?;

        Ok(plan)
    }

    /// Finds a plan by id
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let plan = sqlx::query_as::<_, RechargePlan>(
            r#"
            SELECT id, name, price_cents, points, enabled
            FROM recharge_plans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(plan)
    }

    /// Lists enabled plans (the public catalog)
    pub async fn list_enabled(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let plans = sqlx::query_as::<_, RechargePlan>(
            r#"
            SELECT id, name, price_cents, points, enabled
            FROM recharge_plans
            WHERE enabled = TRUE
            ORDER BY price_cents, id
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(plans)
    }

    /// Lists all plans, enabled and disabled (admin view)
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let plans = sqlx::query_as::<_, RechargePlan>(
            r#"
            SELECT id, name, price_cents, points, enabled
            FROM recharge_plans
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(plans)
    }
}
