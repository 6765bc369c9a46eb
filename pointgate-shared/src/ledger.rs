/// Points ledger
///
/// The [`PointsLedger`] owns every balance mutation. Two rules hold at all
/// times:
///
/// 1. A balance never goes negative.
/// 2. An account's balance equals the sum of its transaction deltas.
///
/// Both are maintained by doing the balance update and the ledger append
/// inside one database transaction, with a row-level lock (`SELECT ... FOR
/// UPDATE`) on the user row serializing concurrent mutations of the same
/// account.
///
/// # Recharge settlement
///
/// Recharging is split into "create a pending payment order" and "settle
/// the order" ([`PointsLedger::settle_order`]). Settlement is idempotent:
/// the pending -> success transition is guarded in SQL, and a second
/// settlement attempt credits nothing. In the current design the recharge
/// endpoint settles synchronously right after creating the order; a real
/// payment integration would instead invoke settlement from the gateway's
/// asynchronous callback, keyed on the external trade reference.
///
/// # Example
///
/// ```no_run
/// use pointgate_shared::ledger::PointsLedger;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = PointsLedger::new(pool);
///
/// let outcome = ledger
///     .consume(user_id, "generate_image", "512x512", "base")
///     .await?;
/// println!("Remaining balance: {}", outcome.remaining);
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::cost_rule::PointsCostRule;
use crate::models::payment_order::PaymentOrder;
use crate::models::points_transaction::{PointsTransaction, TransactionStatus};
use crate::models::recharge_plan::RechargePlan;
use crate::models::user::User;

/// Error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No enabled cost rule matches the (action, size, feature) triple
    #[error("No enabled cost rule for this action")]
    RuleNotFound,

    /// The account's balance does not cover the rule's cost
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        /// Points the rule charges
        required: i64,
        /// Points the account currently holds
        available: i64,
    },

    /// No enabled recharge plan with this id
    #[error("Recharge plan {0} not found")]
    PlanNotFound(i64),

    /// No payment order with this id
    #[error("Payment order {0} not found")]
    OrderNotFound(i64),

    /// The account does not exist
    #[error("Account {0} not found")]
    AccountNotFound(Uuid),

    /// Storage failure; the enclosing transaction was rolled back
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a successful consumption
#[derive(Debug, Clone)]
pub struct ConsumeOutcome {
    /// Points charged
    pub cost: i64,

    /// Balance after the charge
    pub remaining: i64,
}

/// Result of a successful recharge
#[derive(Debug, Clone)]
pub struct RechargeOutcome {
    /// The payment order created for this recharge
    pub order_id: i64,

    /// Balance after the credit
    pub remaining: i64,
}

/// Owns balance mutations and the append-only transaction history
pub struct PointsLedger {
    db: PgPool,
}

impl PointsLedger {
    /// Creates a new ledger over the given pool
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Reads an account's current balance
    pub async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError> {
        let user = User::find_by_id(&self.db, user_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(user_id))?;

        Ok(user.points)
    }

    /// Charges an account for an action
    ///
    /// Looks up the enabled cost rule for the exact (action, size, feature)
    /// triple, then atomically decrements the balance and appends the
    /// matching ledger entry. On [`LedgerError::InsufficientBalance`]
    /// nothing is mutated - neither the balance nor the history changes.
    ///
    /// Concurrent consumptions against the same account serialize on the
    /// user row lock, so the balance check always sees the latest committed
    /// value and can never be raced below zero.
    pub async fn consume(
        &self,
        user_id: Uuid,
        action: &str,
        size: &str,
        feature: &str,
    ) -> Result<ConsumeOutcome, LedgerError> {
        let rule = PointsCostRule::find_enabled(&self.db, action, size, feature)
            .await?
            .ok_or(LedgerError::RuleNotFound)?;

        let mut txn = self.db.begin().await?;

        let user = User::lock_by_id(&mut *txn, user_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(user_id))?;

        if user.points < rule.cost {
            // Dropping the transaction rolls it back; no partial mutation.
            return Err(LedgerError::InsufficientBalance {
                required: rule.cost,
                available: user.points,
            });
        }

        let remaining = User::apply_points_delta(&mut *txn, user_id, -rule.cost)
            .await?
            .ok_or(LedgerError::AccountNotFound(user_id))?;

        let reason = format!("{}_{}_{}", action, size, feature);
        PointsTransaction::insert(
            &mut *txn,
            user_id,
            -rule.cost,
            &reason,
            TransactionStatus::Success,
        )
        .await?;

        txn.commit().await?;

        debug!(%user_id, cost = rule.cost, remaining, reason = %reason, "Points consumed");

        Ok(ConsumeOutcome {
            cost: rule.cost,
            remaining,
        })
    }

    /// Lists an account's ledger entries, newest first
    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PointsTransaction>, LedgerError> {
        Ok(PointsTransaction::list_by_user(&self.db, user_id, limit).await?)
    }

    /// Lists the enabled recharge plans
    pub async fn plans(&self) -> Result<Vec<RechargePlan>, LedgerError> {
        Ok(RechargePlan::list_enabled(&self.db).await?)
    }

    /// Recharges an account: creates a payment order and settles it
    ///
    /// The order is created pending and committed before settlement starts,
    /// mirroring what a real payment integration needs: the pending order
    /// must exist before the user is redirected to the gateway. Settlement
    /// then runs as its own atomic unit.
    ///
    /// There is no payment gateway wired up, so settlement happens
    /// immediately and unconditionally.
    pub async fn recharge(
        &self,
        user_id: Uuid,
        plan_id: i64,
        channel: &str,
    ) -> Result<RechargeOutcome, LedgerError> {
        let plan = RechargePlan::find_by_id(&self.db, plan_id)
            .await?
            .filter(|p| p.enabled)
            .ok_or(LedgerError::PlanNotFound(plan_id))?;

        let order =
            PaymentOrder::create(&self.db, user_id, channel, plan.id, plan.price_cents).await?;

        info!(%user_id, order_id = order.id, plan_id = plan.id, "Payment order created");

        let remaining = self.settle_order(order.id, None).await?;

        Ok(RechargeOutcome {
            order_id: order.id,
            remaining,
        })
    }

    /// Settles a payment order, crediting the plan's points
    ///
    /// Idempotent: if the order has already been settled (by a concurrent
    /// call or a gateway retry) the credit is skipped and the current
    /// balance is returned. The pending -> success transition and the
    /// balance credit commit together.
    ///
    /// This is the intended entry point for a future payment-gateway
    /// callback, which would pass the gateway's trade reference.
    pub async fn settle_order(
        &self,
        order_id: i64,
        external_trade_no: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let mut txn = self.db.begin().await?;

        let order = PaymentOrder::lock_by_id(&mut *txn, order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))?;

        if !PaymentOrder::mark_succeeded(&mut *txn, order_id, external_trade_no).await? {
            // Already settled; return the balance as-is.
            txn.commit().await?;
            return self.balance(order.user_id).await;
        }

        let plan = RechargePlan::find_by_id(&mut *txn, order.plan_id)
            .await?
            .ok_or(LedgerError::PlanNotFound(order.plan_id))?;

        let remaining = User::apply_points_delta(&mut *txn, order.user_id, plan.points)
            .await?
            .ok_or(LedgerError::AccountNotFound(order.user_id))?;

        let reason = format!("recharge_{}", plan.id);
        PointsTransaction::insert(
            &mut *txn,
            order.user_id,
            plan.points,
            &reason,
            TransactionStatus::Success,
        )
        .await?;

        txn.commit().await?;

        info!(
            order_id,
            user_id = %order.user_id,
            credited = plan.points,
            remaining,
            "Payment order settled"
        );

        Ok(remaining)
    }
}
