/// Verification code model and validation
///
/// This module provides the VerificationCode model: time-boxed, single-use
/// numeric codes scoped to a purpose (registration, password reset, phone
/// login) and a subject key (the email, phone number, or account id the
/// code was issued for).
///
/// The consumption rules are deliberately strict:
///
/// - A code flips `used` from false to true exactly once. The update is
///   conditional on `used = FALSE`; a zero-rows-affected update means a
///   concurrent request consumed it first.
/// - Validation selects the most recently issued matching record
///   (largest id wins).
/// - An expired code is left unconsumed and reported as expired every
///   time it is presented; it never silently succeeds later.
///
/// Consumption is designed to run inside the same database transaction as
/// the state transition it gates (account creation, password overwrite,
/// phone login), so either both commit or neither does.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE verification_codes (
///     id BIGSERIAL PRIMARY KEY,
///     purpose TEXT NOT NULL,
///     subject TEXT NOT NULL,
///     code TEXT NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     used BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};

/// What a verification code is allowed to authorize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    /// Email registration
    Register,

    /// Password reset (subject is the account id, not a free-form string)
    ResetPassword,

    /// Passwordless phone login
    PhoneLogin,
}

impl CodePurpose {
    /// Converts purpose to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Register => "register",
            CodePurpose::ResetPassword => "reset_password",
            CodePurpose::PhoneLogin => "phone_login",
        }
    }
}

/// Error type for code validation
///
/// The API layer collapses all three failure variants into one generic
/// "invalid or expired code" message so a caller cannot distinguish which
/// sub-case occurred.
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// No unused record matches purpose + subject + code
    #[error("No matching verification code")]
    NotFound,

    /// The matching record exists but has expired; it stays unconsumed
    #[error("Verification code has expired")]
    Expired,

    /// The record was consumed by a concurrent request
    #[error("Verification code already used")]
    AlreadyUsed,

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A persisted verification code
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationCode {
    /// Row id; doubles as the issue-order tie-break
    pub id: i64,

    /// Purpose string (see [`CodePurpose`])
    pub purpose: String,

    /// Subject key the code is scoped to
    pub subject: String,

    /// The 6-digit code itself
    pub code: String,

    /// When the code stops being valid
    pub expires_at: DateTime<Utc>,

    /// Whether the code has been consumed (monotonic false -> true)
    pub used: bool,

    /// When the code was issued
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Persists a freshly issued code
    pub async fn insert<'e, E>(
        executor: E,
        purpose: CodePurpose,
        subject: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let record = sqlx::query_as::<_, VerificationCode>(
            r#"
            INSERT INTO verification_codes (purpose, subject, code, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, purpose, subject, code, expires_at, used, created_at
            "#,
        )
        .bind(purpose.as_str())
        .bind(subject)
        .bind(code)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;

        Ok(record)
    }

    /// Marks every outstanding (unused) code for this purpose + subject as used
    ///
    /// Issuing a new code supersedes older ones; without this, a stale code
    /// from an earlier request would stay valid until it expired.
    ///
    /// # Returns
    ///
    /// Number of codes invalidated
    pub async fn invalidate_outstanding<'e, E>(
        executor: E,
        purpose: CodePurpose,
        subject: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE verification_codes
            SET used = TRUE
            WHERE purpose = $1 AND subject = $2 AND used = FALSE
            "#,
        )
        .bind(purpose.as_str())
        .bind(subject)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Finds the most recently issued unused record matching purpose + subject + code
    pub async fn find_latest_unused<'e, E>(
        executor: E,
        purpose: CodePurpose,
        subject: &str,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let record = sqlx::query_as::<_, VerificationCode>(
            r#"
            SELECT id, purpose, subject, code, expires_at, used, created_at
            FROM verification_codes
            WHERE purpose = $1 AND subject = $2 AND code = $3 AND used = FALSE
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(purpose.as_str())
        .bind(subject)
        .bind(code)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Consumes a code, conditional on it still being unused
    ///
    /// # Returns
    ///
    /// False when the row was already consumed (zero rows affected) - the
    /// caller must treat that as consumption-already-happened, not success
    pub async fn mark_used<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE verification_codes
            SET used = TRUE
            WHERE id = $1 AND used = FALSE
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Validates a presented code and consumes it
    ///
    /// Runs on a connection rather than a pool so the caller can (and
    /// should) invoke it inside the transaction that performs the gated
    /// state transition. Rolling that transaction back also un-consumes
    /// the code.
    ///
    /// # Errors
    ///
    /// - [`CodeError::NotFound`] - no unused record matches
    /// - [`CodeError::Expired`] - the newest match has expired; the record
    ///   is left unconsumed, so re-presenting it yields `Expired` again
    /// - [`CodeError::AlreadyUsed`] - lost the race against a concurrent
    ///   consumption of the same record
    pub async fn validate_and_consume(
        conn: &mut PgConnection,
        purpose: CodePurpose,
        subject: &str,
        code: &str,
    ) -> Result<Self, CodeError> {
        let record = Self::find_latest_unused(&mut *conn, purpose, subject, code)
            .await?
            .ok_or(CodeError::NotFound)?;

        if record.expires_at <= Utc::now() {
            return Err(CodeError::Expired);
        }

        if !Self::mark_used(&mut *conn, record.id).await? {
            return Err(CodeError::AlreadyUsed);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_as_str() {
        assert_eq!(CodePurpose::Register.as_str(), "register");
        assert_eq!(CodePurpose::ResetPassword.as_str(), "reset_password");
        assert_eq!(CodePurpose::PhoneLogin.as_str(), "phone_login");
    }

    #[test]
    fn test_code_error_display() {
        assert_eq!(
            CodeError::NotFound.to_string(),
            "No matching verification code"
        );
        assert_eq!(
            CodeError::Expired.to_string(),
            "Verification code has expired"
        );
        assert_eq!(
            CodeError::AlreadyUsed.to_string(),
            "Verification code already used"
        );
    }

    // Consumption semantics (single use, most-recent-wins, expired
    // idempotence) are exercised against a real database in
    // pointgate-api/tests/auth_flow_test.rs
}
