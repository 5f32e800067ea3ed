use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Fire-and-forget operational warnings. Delivery failure must never fail a
/// run, so implementations swallow their own errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn warn(&self, subject: &str, message: &str);
}

/// Writes warnings to the log only. The default when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn warn(&self, subject: &str, message: &str) {
        warn!(subject = %subject, "{}", message);
    }
}

/// Posts warnings as JSON to a configured endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout_seconds: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn warn(&self, subject: &str, message: &str) {
        let body = serde_json::json!({
            "subject": subject,
            "message": message,
        });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(r) if r.status().is_success() => {
                debug!("Warning delivered to webhook: {}", subject);
            }
            Ok(r) => {
                warn!(
                    "Webhook responded with status {} for warning '{}'",
                    r.status().as_u16(),
                    subject
                );
            }
            Err(e) => {
                warn!("Failed to deliver warning '{}': {}", subject, e);
            }
        }
    }
}
