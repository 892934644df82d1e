//! Notification delivery for alerts

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::config::NotifyTarget;
use super::message::Message;

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const IFTTT_API_URL: &str = "https://maker.ifttt.com";

/// Operator channel that alert messages are delivered to
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
}

/// Notifier for sending alert notifications to every configured target
pub struct Notifier {
    client: reqwest::Client,
    targets: Vec<NotifyTarget>,
    telegram_url: String,
    ifttt_url: String,
}

impl Notifier {
    /// Create a new notifier
    pub fn new(targets: Vec<NotifyTarget>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self {
            client,
            targets,
            telegram_url: TELEGRAM_API_URL.to_string(),
            ifttt_url: IFTTT_API_URL.to_string(),
        })
    }

    /// Point the Telegram and IFTTT targets at other hosts
    pub fn with_api_urls(mut self, telegram: impl Into<String>, ifttt: impl Into<String>) -> Self {
        self.telegram_url = telegram.into();
        self.ifttt_url = ifttt.into();
        self
    }

    /// Send notification to all targets
    ///
    /// Succeeds when at least one target delivered; failed targets are logged.
    /// Fails only when every target failed.
    pub async fn notify(&self, message: &Message) -> Result<(), DeliveryError> {
        let mut errors = Vec::new();

        for target in &self.targets {
            let text = message.render(target.line_break());
            if let Err(e) = self.notify_target(target, &text).await {
                tracing::error!(channel = target.kind(), error = %e, "Notification failed");
                errors.push(e);
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        if errors.len() < self.targets.len() {
            tracing::warn!(
                failed = errors.len(),
                delivered = self.targets.len() - errors.len(),
                "Notification partially delivered"
            );
            return Ok(());
        }

        match errors.len() {
            1 => Err(errors.remove(0)),
            _ => Err(DeliveryError::Multiple(errors)),
        }
    }

    /// Send notification to a single target
    async fn notify_target(&self, target: &NotifyTarget, text: &str) -> Result<(), DeliveryError> {
        match target {
            NotifyTarget::Log => {
                tracing::warn!("Alert: {}", text);
                Ok(())
            }
            NotifyTarget::Telegram { bot_token, chat_id } => {
                self.send_telegram(bot_token, chat_id, text).await
            }
            NotifyTarget::Ifttt { event, key } => self.send_ifttt(event, key, text).await,
            NotifyTarget::Webhook { url, headers } => self.send_webhook(url, headers, text).await,
        }
    }

    async fn send_telegram(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}/bot{}/sendMessage", self.telegram_url, bot_token);
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Telegram(format!("Failed to send message: {}", e)))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Telegram(format!(
                "Bot API returned status {}",
                response.status()
            )));
        }

        tracing::debug!(chat_id = %chat_id, "Telegram notification sent");
        Ok(())
    }

    async fn send_ifttt(&self, event: &str, key: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/trigger/{}/with/key/{}", self.ifttt_url, event, key);
        let payload = serde_json::json!({ "value1": text });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Ifttt(format!("Failed to trigger event: {}", e)))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Ifttt(format!(
                "Maker webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(event = %event, "IFTTT notification sent");
        Ok(())
    }

    /// Send webhook notification
    async fn send_webhook(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "message": text,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut request = self.client.post(url).json(&payload);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(url = %url, "Webhook notification sent");
        Ok(())
    }
}

#[async_trait]
impl AlertSink for Notifier {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        self.notify(message).await
    }
}

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("IFTTT error: {0}")]
    Ifttt(String),

    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Multiple notification failures: {0:?}")]
    Multiple(Vec<DeliveryError>),
}
