/// Payment order model
///
/// An order is created in `pending` state when a recharge starts and
/// transitions to `success` when the payment settles. The transition is
/// guarded in SQL (`WHERE status = 'pending'`), so settling the same order
/// twice is a no-op rather than a double credit.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE payment_orders (
///     id BIGSERIAL PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     channel TEXT NOT NULL,
///     plan_id BIGINT NOT NULL REFERENCES recharge_plans(id),
///     amount_cents BIGINT NOT NULL,
///     status TEXT NOT NULL DEFAULT 'pending',
///     external_trade_no TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Payment order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, payment not yet confirmed
    Pending,

    /// Payment settled, points credited
    Success,

    /// Payment failed or was rejected
    Failed,
}

impl OrderStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Success => "success",
            OrderStatus::Failed => "failed",
        }
    }
}

/// A payment order
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentOrder {
    /// Row id (returned to clients as the order id)
    pub id: i64,

    /// Account that initiated the recharge
    pub user_id: Uuid,

    /// Payment channel, e.g. "wechat"
    pub channel: String,

    /// The plan being purchased
    pub plan_id: i64,

    /// Amount in cents, copied from the plan at creation time
    pub amount_cents: i64,

    /// Lifecycle state ("pending", "success", "failed")
    pub status: String,

    /// Trade reference assigned by the external payment gateway
    pub external_trade_no: Option<String>,

    /// When the order was created
    pub created_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// Creates a pending order
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        channel: &str,
        plan_id: i64,
        amount_cents: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let order = sqlx::query_as::<_, PaymentOrder>(
            r#"
            INSERT INTO payment_orders (user_id, channel, plan_id, amount_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, channel, plan_id, amount_cents, status,
                      external_trade_no, created_at
            "#,
        )
        .bind(user_id)
        .bind(channel)
        .bind(plan_id)
        .bind(amount_cents)
        .fetch_one(executor)
        .await?;

        Ok(order)
    }

    /// Finds an order by id and takes a row-level lock on it
    ///
    /// Must run inside a transaction; concurrent settlements of the same
    /// order serialize here.
    pub async fn lock_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let order = sqlx::query_as::<_, PaymentOrder>(
            r#"
            SELECT id, user_id, channel, plan_id, amount_cents, status,
                   external_trade_no, created_at
            FROM payment_orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(order)
    }

    /// Transitions an order from pending to success
    ///
    /// The update is conditional on `status = 'pending'`; settling an
    /// already-settled order affects zero rows.
    ///
    /// # Returns
    ///
    /// True if this call performed the transition
    pub async fn mark_succeeded<'e, E>(
        executor: E,
        id: i64,
        external_trade_no: Option<&str>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = 'success', external_trade_no = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(external_trade_no)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists orders, newest first (admin view)
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let orders = sqlx::query_as::<_, PaymentOrder>(
            r#"
            SELECT id, user_id, channel, plan_id, amount_cents, status,
                   external_trade_no, created_at
            FROM payment_orders
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(orders)
    }
}
