/// Points transaction model
///
/// Append-only ledger entries: one row per balance-affecting event, with a
/// signed delta and a reason string. Rows are never updated or deleted.
///
/// Invariant: for every account, the sum of transaction deltas equals the
/// account's current balance. Every insert here happens in the same
/// database transaction as the matching `users.points` update.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE points_transactions (
///     id BIGSERIAL PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     delta BIGINT NOT NULL,
///     reason TEXT NOT NULL,
///     status TEXT NOT NULL DEFAULT 'success',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Outcome recorded on a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// The balance mutation committed
    Success,

    /// The attempt was recorded but did not change the balance
    Failed,
}

impl TransactionStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// A single ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointsTransaction {
    /// Row id
    pub id: i64,

    /// Account the entry belongs to
    pub user_id: Uuid,

    /// Signed balance change (negative for consumption)
    pub delta: i64,

    /// What caused the change, e.g. "generate_image_512x512_base"
    pub reason: String,

    /// Entry status ("success" or "failed")
    pub status: String,

    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

impl PointsTransaction {
    /// Appends a ledger entry
    ///
    /// Accepts any executor so it can run in the same transaction as the
    /// balance update it records.
    pub async fn insert<'e, E>(
        executor: E,
        user_id: Uuid,
        delta: i64,
        reason: &str,
        status: TransactionStatus,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let transaction = sqlx::query_as::<_, PointsTransaction>(
            r#"
            INSERT INTO points_transactions (user_id, delta, reason, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, delta, reason, status, created_at
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .bind(reason)
        .bind(status.as_str())
        .fetch_one(executor)
        .await?;

        Ok(transaction)
    }

    /// Lists an account's ledger entries, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let transactions = sqlx::query_as::<_, PointsTransaction>(
            r#"
            SELECT id, user_id, delta, reason, status, created_at
            FROM points_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(transactions)
    }

    /// Sums all successful deltas for an account
    ///
    /// By the ledger invariant this must always equal the account's
    /// current balance.
    pub async fn sum_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (sum,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(delta), 0)
            FROM points_transactions
            WHERE user_id = $1 AND status = 'success'
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(TransactionStatus::Success.as_str(), "success");
        assert_eq!(TransactionStatus::Failed.as_str(), "failed");
    }

    // The balance == sum-of-deltas invariant is exercised against a real
    // database in pointgate-api/tests/points_ledger_test.rs
}
