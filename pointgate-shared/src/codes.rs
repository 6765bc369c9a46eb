/// Verification code issuance
///
/// The [`CodeIssuer`] generates a random 6-digit code, persists it with an
/// expiry, and dispatches it to the subject's email address or phone number
/// through the configured [`Notifier`].
///
/// Issuing a new code supersedes any outstanding codes for the same
/// purpose + subject: they are marked used in the same transaction that
/// stores the new one, so at most one code per (purpose, subject) is ever
/// redeemable.
///
/// The code is dispatched only after the storing transaction commits; a
/// delivery failure therefore leaves a stored-but-undelivered code behind,
/// and is reported as [`IssueError::Delivery`] - distinct from a storage
/// failure - so the caller can tell the two apart.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use chrono::Duration;
/// use pointgate_shared::codes::CodeIssuer;
/// use pointgate_shared::models::verification_code::CodePurpose;
/// use pointgate_shared::notify::LogNotifier;
/// # use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = CodeIssuer::new(pool, Arc::new(LogNotifier));
///
/// issuer
///     .issue(
///         CodePurpose::Register,
///         "user@example.com",
///         "user@example.com",
///         Duration::minutes(5),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::models::verification_code::{CodePurpose, VerificationCode};
use crate::notify::{Notifier, NotifyError};

/// Number of digits in a verification code
pub const CODE_DIGITS: usize = 6;

/// Error type for code issuance
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    /// Could not persist the code
    #[error("Failed to store verification code: {0}")]
    Storage(#[from] sqlx::Error),

    /// The code was stored but could not be delivered
    #[error(transparent)]
    Delivery(#[from] NotifyError),
}

/// Generates a uniformly random zero-padded 6-digit code
///
/// The space is 1,000,000 values; codes are rate-of-guessing protected by
/// their short TTL and single-use semantics, not by entropy.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Issues verification codes and dispatches them via a [`Notifier`]
pub struct CodeIssuer {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl CodeIssuer {
    /// Creates a new issuer
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Issues a code for `subject` and sends it to `destination`
    ///
    /// For registration and phone login the subject and the destination are
    /// the same string (the email / phone being verified); for password
    /// resets the subject is the account id while the destination is the
    /// account's email address.
    ///
    /// # Errors
    ///
    /// - [`IssueError::Storage`] - the code was not persisted; nothing was
    ///   sent
    /// - [`IssueError::Delivery`] - the code was persisted but delivery
    ///   failed
    pub async fn issue(
        &self,
        purpose: CodePurpose,
        subject: &str,
        destination: &str,
        ttl: Duration,
    ) -> Result<(), IssueError> {
        let code = generate_code();
        let expires_at = Utc::now() + ttl;

        let mut txn = self.db.begin().await?;

        let superseded =
            VerificationCode::invalidate_outstanding(&mut *txn, purpose, subject).await?;
        if superseded > 0 {
            debug!(
                purpose = purpose.as_str(),
                superseded, "Invalidated outstanding verification codes"
            );
        }

        let record =
            VerificationCode::insert(&mut *txn, purpose, subject, &code, expires_at).await?;

        txn.commit().await?;

        debug!(
            purpose = purpose.as_str(),
            code_id = record.id,
            "Stored verification code"
        );

        let (subject_line, body) = compose_message(purpose, &code, ttl);
        if let Err(e) = self.notifier.send(destination, &subject_line, &body).await {
            warn!(
                purpose = purpose.as_str(),
                error = %e,
                "Verification code stored but delivery failed"
            );
            return Err(e.into());
        }

        Ok(())
    }
}

/// Builds the subject line and body for a code delivery
fn compose_message(purpose: CodePurpose, code: &str, ttl: Duration) -> (String, String) {
    let minutes = ttl.num_minutes().max(1);

    let subject_line = match purpose {
        CodePurpose::Register => "Your registration code",
        CodePurpose::ResetPassword => "Your password reset code",
        CodePurpose::PhoneLogin => "Your login code",
    };

    let body = format!(
        "Your verification code is {}. It expires in {} minute{}. Do not share it with anyone.",
        code,
        minutes,
        if minutes == 1 { "" } else { "s" }
    );

    (subject_line.to_string(), body)
}
