/// Points cost rule model
///
/// A cost rule maps the (action, size, feature) triple to a points cost.
/// A partial unique index guarantees at most one enabled rule per triple;
/// disabled rules are kept for history.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE points_cost_rules (
///     id BIGSERIAL PRIMARY KEY,
///     action TEXT NOT NULL,
///     size TEXT NOT NULL,
///     feature TEXT NOT NULL,
///     cost BIGINT NOT NULL CHECK (cost >= 0),
///     enabled BOOLEAN NOT NULL DEFAULT TRUE
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

/// A points cost rule
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointsCostRule {
    /// Row id
    pub id: i64,

    /// Action being charged, e.g. "generate_image"
    pub action: String,

    /// Size variant, e.g. "512x512"
    pub size: String,

    /// Feature tier, e.g. "base"
    pub feature: String,

    /// Cost in points
    pub cost: i64,

    /// Whether the rule is in effect
    pub enabled: bool,
}

/// Input for creating a cost rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCostRule {
    /// Action being charged
    pub action: String,

    /// Size variant
    pub size: String,

    /// Feature tier
    pub feature: String,

    /// Cost in points
    pub cost: i64,
}

impl PointsCostRule {
    /// Creates an enabled cost rule
    ///
    /// # Errors
    ///
    /// Returns a unique-constraint error if an enabled rule for the same
    /// triple already exists
    pub async fn create(pool: &PgPool, data: CreateCostRule) -> Result<Self, sqlx::Error> {
        let rule = sqlx::query_as::<_, PointsCostRule>(
            r#"
            INSERT INTO points_cost_rules (action, size, feature, cost)
            VALUES ($1, $2, $3, $4)
            RETURNING id, action, size, feature, cost, enabled
            "#,
        )
        .bind(data.action)
        .bind(data.size)
        .bind(data.feature)
        .bind(data.cost)
        .fetch_one(pool)
        .await?;

        Ok(rule)
    }

    /// Finds the enabled rule for an exact (action, size, feature) triple
    pub async fn find_enabled<'e, E>(
        executor: E,
        action: &str,
        size: &str,
        feature: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rule = sqlx::query_as::<_, PointsCostRule>(
            r#"
            SELECT id, action, size, feature, cost, enabled
            FROM points_cost_rules
            WHERE action = $1 AND size = $2 AND feature = $3 AND enabled = TRUE
            "#,
        )
        .bind(action)
        .bind(size)
        .bind(feature)
        .fetch_optional(executor)
        .await?;

        Ok(rule)
    }

    /// Lists all rules, enabled and disabled
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let rules = sqlx::query_as::<_, PointsCostRule>(
            r#"
            SELECT id, action, size, feature, cost, enabled
            FROM points_cost_rules
            ORDER BY action, size, feature, id
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rules)
    }

    /// Enables or disables a rule
    ///
    /// # Returns
    ///
    /// True if the rule existed and was updated
    pub async fn set_enabled(pool: &PgPool, id: i64, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE points_cost_rules
            SET enabled = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(enabled)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
