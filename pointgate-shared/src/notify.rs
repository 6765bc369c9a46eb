/// Notification sender abstraction
///
/// Verification codes are delivered out-of-band (email or SMS). This module
/// defines the [`Notifier`] trait the code issuer depends on, plus two
/// implementations:
///
/// - [`HttpNotifier`]: posts the message to a transactional mail/SMS
///   gateway over HTTPS (Brevo-style JSON API)
/// - [`LogNotifier`]: writes the message to the log instead of sending it,
///   for development and tests
///
/// Delivery failure is its own error type so callers can distinguish "the
/// code was stored but the email bounced" from a storage failure.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

/// Error type for notification delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Could not reach the gateway at all
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// The gateway answered with a non-success status
    #[error("Notification gateway rejected the request with status {status}")]
    Gateway {
        /// HTTP status code returned by the gateway
        status: u16,
    },
}

/// Something that can deliver a message to an email address or phone number
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a message
    ///
    /// # Arguments
    ///
    /// * `destination` - Email address or phone number
    /// * `subject` - Subject line (ignored by SMS channels)
    /// * `body` - Message body
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails; the caller surfaces this
    /// separately from storage errors
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier backed by an HTTP mail/SMS gateway
///
/// Sends a JSON payload to a configurable endpoint, authenticating with an
/// `api-key` header. Any transactional provider with a "from / to / subject
/// / body" JSON API fits this shape.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl HttpNotifier {
    /// Creates a gateway-backed notifier
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the gateway's send endpoint
    /// * `api_key` - Gateway API key, sent as the `api-key` header
    /// * `sender` - Sender identity (from-address or SMS sender id)
    pub fn new(endpoint: String, api_key: String, sender: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        debug!(destination, subject, "Dispatching notification");

        let payload = json!({
            "sender": self.sender,
            "to": destination,
            "subject": subject,
            "content": body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Gateway {
                status: response.status().as_u16(),
            });
        }

        debug!(destination, "Notification accepted by gateway");
        Ok(())
    }
}

/// Notifier that logs instead of sending
///
/// Useful in development, where the verification code must be readable
/// somewhere, and in tests. Never use in production: the code appears in
/// the log in clear text.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(destination, subject, body, "Notification (log sink)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        let result = notifier
            .send("a@example.com", "Test", "Hello")
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError::Gateway { status: 503 };
        assert_eq!(
            err.to_string(),
            "Notification gateway rejected the request with status 503"
        );

        let err = NotifyError::Delivery("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
