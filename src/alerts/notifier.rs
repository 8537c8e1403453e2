//! Alert delivery.
//!
//! The core engine only sees [`Notifier`]. Failures are reported back to the
//! caller and never retried here; the operator re-triggers through the
//! manual alert path.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::types::AlertPayload;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Notification endpoint returned status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, payload: &AlertPayload) -> Result<(), NotificationError>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// Log-only notifier
// ============================================================================

/// Writes alerts to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, payload: &AlertPayload) -> Result<(), NotificationError> {
        info!(
            recipient = %payload.recipient,
            subject = %payload.subject,
            body_bytes = payload.html_body.len(),
            "ALERT"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// ============================================================================
// Webhook notifier
// ============================================================================

/// POSTs the alert payload as JSON to a mail relay or chat webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, NotificationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_alert(&self, payload: &AlertPayload) -> Result<(), NotificationError> {
        let resp = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        if resp.status().is_success() {
            info!(subject = %payload.subject, "Alert delivered via webhook");
            Ok(())
        } else {
            Err(NotificationError::Rejected(resp.status().as_u16()))
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
