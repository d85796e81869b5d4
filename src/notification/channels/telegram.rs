//! Telegram 渠道（Bot API sendMessage）

use super::{cooldown_from_secs, http_client, truncate_body};
use crate::notification::channel::{AlertTopic, NotificationChannel, NotificationMessage, SendResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

fn default_enabled() -> bool {
    true
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// Telegram 渠道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bot token
    #[serde(default)]
    pub token: String,
    /// Chat ID
    #[serde(default)]
    pub chat_id: String,
    /// 默认话题 thread id
    #[serde(default)]
    pub thread_id: Option<String>,
    /// 主题 -> thread id（"litter" / "drink"）
    #[serde(default)]
    pub topic_threads: BTreeMap<String, String>,
    #[serde(default)]
    pub cooldown_secs: Option<f64>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            token: String::new(),
            chat_id: String::new(),
            thread_id: None,
            topic_threads: BTreeMap::new(),
            cooldown_secs: None,
            api_base: default_api_base(),
        }
    }
}

impl TelegramConfig {
    /// 主题对应的 thread id，没有单独配置时使用默认 thread
    pub fn thread_for(&self, topic: Option<AlertTopic>) -> Option<&str> {
        topic
            .and_then(|t| self.topic_threads.get(t.as_str()))
            .or(self.thread_id.as_ref())
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Telegram 渠道
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn cooldown(&self) -> Option<Duration> {
        cooldown_from_secs(self.config.cooldown_secs)
    }

    async fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        if self.config.token.is_empty() || self.config.chat_id.is_empty() {
            return Ok(SendResult::Skipped(
                "missing telegram token/chat_id".to_string(),
            ));
        }

        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.token
        );

        let mut params = vec![
            ("chat_id", self.config.chat_id.clone()),
            ("text", message.content.clone()),
        ];
        if let Some(thread) = self.config.thread_for(message.topic) {
            params.push(("message_thread_id", thread.to_string()));
        }

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        if status.as_u16() == 200 {
            Ok(SendResult::Sent)
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(SendResult::Failed(format!(
                "HTTP {} {}",
                status.as_u16(),
                truncate_body(&body)
            )))
        }
    }
}
