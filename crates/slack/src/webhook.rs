use async_trait::async_trait;
use gammon_core::config::SlackConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a message to a channel. The relay only ever needs this one
/// operation, and tests substitute a recording implementation.
#[async_trait]
pub trait MessagePoster: Send + Sync + 'static {
    async fn post(&self, text: &str, channel: &str) -> Result<(), WebhookError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    channel: &'a str,
    username: &'a str,
    icon_emoji: &'a str,
}

/// Posts JSON payloads to a Slack incoming-webhook URL.
#[derive(Clone, Debug)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    username: String,
    icon_emoji: String,
}

impl WebhookClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.webhook_url.clone(),
            username: config.bot_username.clone(),
            icon_emoji: config.icon_emoji.clone(),
        }
    }
}

#[async_trait]
impl MessagePoster for WebhookClient {
    async fn post(&self, text: &str, channel: &str) -> Result<(), WebhookError> {
        let payload = WebhookPayload {
            text,
            channel,
            username: &self.username,
            icon_emoji: &self.icon_emoji,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::Rejected { status: status.as_u16(), body });
        }

        debug!(channel = %channel, bytes = text.len(), "webhook message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::WebhookPayload;

    #[test]
    fn payload_serializes_to_the_incoming_webhook_shape() {
        let payload = WebhookPayload {
            text: "austin quit game against gnubg",
            channel: "C123",
            username: "slackgammon",
            icon_emoji: ":bg:",
        };

        let value = serde_json::to_value(&payload).expect("payload should serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "text": "austin quit game against gnubg",
                "channel": "C123",
                "username": "slackgammon",
                "icon_emoji": ":bg:",
            })
        );
    }
}
