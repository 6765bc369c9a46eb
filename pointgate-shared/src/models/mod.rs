/// Database models for Pointgate
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts (email/phone identity, password hash, points balance)
/// - `verification_code`: Time-boxed single-use verification codes
/// - `points_transaction`: Append-only points ledger entries
/// - `cost_rule`: Points cost rules keyed by (action, size, feature)
/// - `recharge_plan`: Purchasable points bundles
/// - `payment_order`: Payment orders created by the recharge workflow
///
/// # Example
///
/// ```no_run
/// use pointgate_shared::models::user::{User, CreateUser};
/// use pointgate_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: Some("user@example.com".to_string()),
///     phone: None,
///     password_hash: "$argon2id$...".to_string(),
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod cost_rule;
pub mod payment_order;
pub mod points_transaction;
pub mod recharge_plan;
pub mod user;
pub mod verification_code;
