//! Inbound webhooks from the identity provider
//!
//! Webhooks are authenticated by a shared secret rather than a session. How a payload is
//! verified is up to the [`WebhookVerifier`] implementation; the route only needs a verified
//! [`WebhookEvent`] back.
use crate::auth::ConstantTimeString;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the shared secret for [`SharedSecretVerifier`].
pub const WEBHOOK_SECRET_HEADER: &str = "webhook-secret";

/// Event type sent when an organization is deleted at the identity provider.
pub const ORGANIZATION_DELETED: &str = "organization.deleted";

/// A verified webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// The `data.id` of the event, when it has one.
    pub fn subject_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook could not be verified: {0}")]
    Unverified(String),

    #[error("webhook payload is malformed: {0}")]
    Malformed(String),
}

/// Given the raw payload and its headers, returns the verified event or fails.
///
/// Implementations own the secret.
pub trait WebhookVerifier: Send + Sync + std::fmt::Debug {
    fn verify(&self, payload: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError>;
}

/// Accepts deliveries whose [`WEBHOOK_SECRET_HEADER`] equals the configured secret.
#[derive(Debug, Clone)]
pub struct SharedSecretVerifier {
    secret: ConstantTimeString,
}

impl SharedSecretVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: ConstantTimeString::from(secret.into()),
        }
    }
}

impl WebhookVerifier for SharedSecretVerifier {
    fn verify(&self, payload: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        let presented = headers
            .get(WEBHOOK_SECRET_HEADER)
            .ok_or_else(|| {
                WebhookError::Unverified(format!("missing {WEBHOOK_SECRET_HEADER} header"))
            })?
            .to_str()
            .map_err(|_| WebhookError::Unverified("secret header is not valid text".into()))?;

        if ConstantTimeString::from(presented) != self.secret {
            return Err(WebhookError::Unverified("secret does not match".into()));
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::Malformed(e.to_string()))
    }
}
