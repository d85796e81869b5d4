//! Slack 渠道（Incoming Webhook）

use super::{cooldown_from_secs, http_client, truncate_body};
use crate::notification::channel::{NotificationChannel, NotificationMessage, SendResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_enabled() -> bool {
    true
}

/// Slack 渠道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub cooldown_secs: Option<f64>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            webhook_url: String::new(),
            cooldown_secs: None,
        }
    }
}

/// Slack 渠道
pub struct SlackChannel {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }
}

/// Slack webhook 成功时返回空 body 或 "ok"
fn is_ok_body(body: &str) -> bool {
    let body = body.trim();
    body.is_empty() || body.eq_ignore_ascii_case("ok")
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn cooldown(&self) -> Option<Duration> {
        cooldown_from_secs(self.config.cooldown_secs)
    }

    async fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        let webhook = self.config.webhook_url.trim();
        if webhook.is_empty() {
            return Ok(SendResult::Skipped("missing slack webhook_url".to_string()));
        }

        let response = self
            .client
            .post(webhook)
            .json(&serde_json::json!({ "text": message.content }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 200 && is_ok_body(&body) {
            Ok(SendResult::Sent)
        } else {
            Ok(SendResult::Failed(format!(
                "HTTP {}, body={}",
                status.as_u16(),
                truncate_body(body.trim())
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ok_body() {
        assert!(is_ok_body(""));
        assert!(is_ok_body("ok\n"));
        assert!(is_ok_body("OK"));
        assert!(!is_ok_body("invalid_payload"));
    }

    #[tokio::test]
    async fn test_missing_webhook_skips() {
        let channel = SlackChannel::new(SlackConfig::default()).unwrap();
        let result = channel.send(&NotificationMessage::new("hi")).await.unwrap();
        assert_eq!(result, SendResult::Skipped("missing slack webhook_url".to_string()));
    }
}
