//! Notifier: best-effort webhook delivery of recovery messages.
//!
//! A failed notification must never divert the escalation path, so
//! [`Notifier::notify`] has no error channel. [`WebhookNotifier::deliver`]
//! is the fallible form used by the self-test surface.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{NotifyConfig, MESSAGE_SLOT};
use crate::error::NotifyError;

/// Client-side bound on one webhook request.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);

pub const RESUMED_AFTER_RESTART: &str =
    "[netmon] Network went out and resumed after network restart";
pub const RESUMED_AFTER_REBOOT: &str = "[netmon] Network went out and resumed after reboot";
pub const RESUMED_ON_ITS_OWN: &str = "[netmon] Network went out and resumed itself";
pub const TEST_MESSAGE: &str = "[netmon] Test message";

/// Fire-and-forget message sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Substitute `message` into `template`, escaped as a JSON string body so
/// quotes or backslashes in the message cannot break the payload.
pub fn render_payload(template: &str, message: &str) -> String {
    let quoted = serde_json::Value::String(message.to_string()).to_string();
    let escaped = &quoted[1..quoted.len() - 1];
    template.replacen(MESSAGE_SLOT, escaped, 1)
}

/// Posts the rendered template to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Send `message`, reporting the outcome.
    pub async fn deliver(&self, message: &str) -> Result<(), NotifyError> {
        if !self.is_configured() || message.is_empty() {
            return Err(NotifyError::NotConfigured);
        }

        let body = render_payload(&self.config.payload_template, message);
        let response = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) {
        match self.deliver(message).await {
            Ok(()) => tracing::info!(text = message, "Notification sent"),
            Err(NotifyError::NotConfigured) => {
                tracing::debug!("Notification skipped: endpoint not configured");
            }
            Err(e) => tracing::warn!(error = %e, "Notification delivery failed"),
        }
    }
}
