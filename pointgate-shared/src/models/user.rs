/// User model and database operations
///
/// This module provides the User model and CRUD operations for managing
/// accounts. An account is identified by an email address, a phone number,
/// or both; at least one must be set and each is unique across all accounts.
///
/// Uniqueness is enforced by the database, not by application-level
/// pre-checks: two concurrent registrations for the same email both pass
/// the lookup, but only the first insert commits.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT UNIQUE,
///     phone TEXT UNIQUE,
///     password_hash TEXT NOT NULL DEFAULT '',
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
///     points BIGINT NOT NULL DEFAULT 0 CHECK (points >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
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
/// let user = User::create(
///     &pool,
///     CreateUser {
///         email: Some("user@example.com".to_string()),
///         phone: None,
///         password_hash: "$argon2id$...".to_string(),
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "user@example.com").await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// User model representing an account
///
/// Passwords are stored as Argon2id hashes; phone-only accounts created by
/// the passwordless login flow carry an empty `password_hash` and cannot
/// log in with a password.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique account ID (UUID v4)
    pub id: Uuid,

    /// Email address, unique across all accounts
    pub email: Option<String>,

    /// Phone number, unique across all accounts
    pub phone: Option<String>,

    /// Argon2id password hash; empty string for phone-only accounts
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Whether the account may authenticate
    pub is_active: bool,

    /// Whether the account may access admin endpoints
    pub is_superuser: bool,

    /// Current points balance, never negative
    pub points: i64,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,

    /// When the account last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new account
///
/// At least one of `email` / `phone` must be set; the database CHECK
/// constraint rejects rows with neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address
    pub email: Option<String>,

    /// Phone number
    pub phone: Option<String>,

    /// Argon2id password hash (NOT a plaintext password!)
    ///
    /// Pass an empty string for phone-only accounts.
    pub password_hash: String,
}

impl User {
    /// Creates a new account
    ///
    /// Accepts any executor so it can run inside the registration
    /// transaction, atomically with the verification-code consumption.
    ///
    /// # Errors
    ///
    /// Returns an error if the email or phone already exists (unique
    /// constraint violation) or the database is unavailable
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, phone, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, phone, password_hash, is_active, is_superuser, points,
                      created_at, updated_at, last_login_at
            "#,
        )
        .bind(data.email)
        .bind(data.phone)
        .bind(data.password_hash)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    /// Finds an account by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, password_hash, is_active, is_superuser, points,
                   created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds an account by email address
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, password_hash, is_active, is_superuser, points,
                   created_at, updated_at, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds an account by phone number
    pub async fn find_by_phone<'e, E>(executor: E, phone: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, password_hash, is_active, is_superuser, points,
                   created_at, updated_at, last_login_at
            FROM users
            WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds an account by ID and takes a row-level lock on it
    ///
    /// Must run inside a transaction. Concurrent balance mutations for the
    /// same account serialize on this lock, which is what keeps the balance
    /// read-modify-write race-free.
    pub async fn lock_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, password_hash, is_active, is_superuser, points,
                   created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Replaces the stored password hash
    ///
    /// Used by the password-reset flow (inside the reset transaction) and
    /// by login-time opportunistic rehashing.
    ///
    /// # Returns
    ///
    /// True if the account existed and was updated
    pub async fn update_password<'e, E>(
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a signed delta to the points balance
    ///
    /// Must run inside a transaction together with the matching
    /// `points_transactions` insert; the two form one atomic unit. The
    /// CHECK constraint on `points` is the last line of defense against a
    /// negative balance.
    ///
    /// # Returns
    ///
    /// The new balance, or None if the account doesn't exist
    pub async fn apply_points_delta<'e, E>(
        executor: E,
        id: Uuid,
        delta: i64,
    ) -> Result<Option<i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let points: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET points = points + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING points
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;

        Ok(points.map(|(p,)| p))
    }

    /// Updates the last login timestamp for an account
    ///
    /// This is typically called after successful authentication.
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists accounts with pagination, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, phone, password_hash, is_active, is_superuser, points,
                   created_at, updated_at, last_login_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Counts total number of accounts
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Whether this account can authenticate with a password
    ///
    /// Phone-only accounts carry an empty hash and must use the
    /// passwordless phone-login flow.
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_struct() {
        let create_user = CreateUser {
            email: Some("test@example.com".to_string()),
            phone: None,
            password_hash: "hash".to_string(),
        };

        assert_eq!(create_user.email.as_deref(), Some("test@example.com"));
        assert!(create_user.phone.is_none());
    }

    #[test]
    fn test_has_password() {
        let mut user = User {
            id: Uuid::new_v4(),
            email: None,
            phone: Some("+15550001111".to_string()),
            password_hash: String::new(),
            is_active: true,
            is_superuser: false,
            points: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        assert!(!user.has_password());

        user.password_hash = "$argon2id$...".to_string();
        assert!(user.has_password());
    }

    // Integration tests for database operations are in pointgate-api/tests/
}
