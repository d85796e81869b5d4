//! WhatsApp 渠道（Twilio Messages API）

use super::{cooldown_from_secs, http_client, truncate_body};
use crate::notification::channel::{NotificationChannel, NotificationMessage, SendResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

fn default_cooldown() -> Option<f64> {
    Some(120.0)
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// WhatsApp 渠道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// 发送方，例如 whatsapp:+14155238886
    #[serde(default)]
    pub from: String,
    /// 接收方列表
    #[serde(default)]
    pub to: Vec<String>,
    /// Twilio 有突发频率限制，默认 120 秒冷却
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: Option<f64>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            to: Vec::new(),
            cooldown_secs: default_cooldown(),
            api_base: default_api_base(),
        }
    }
}

impl WhatsAppConfig {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.account_sid.is_empty() {
            missing.push("account_sid");
        }
        if self.auth_token.is_empty() {
            missing.push("auth_token");
        }
        if self.from.is_empty() {
            missing.push("from");
        }
        if self.to.iter().all(|r| r.trim().is_empty()) {
            missing.push("to");
        }
        missing
    }
}

/// WhatsApp 渠道
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }

    async fn send_to(&self, url: &str, to: &str, body: &str) -> std::result::Result<(), String> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("From", self.config.from.as_str()), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(format!("HTTP {} {}", status.as_u16(), truncate_body(&text)))
        }
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn cooldown(&self) -> Option<Duration> {
        cooldown_from_secs(self.config.cooldown_secs)
    }

    /// 逐个接收方发送；至少一个成功即视为成功，部分失败只记录日志
    async fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        let missing = self.config.missing_fields();
        if !missing.is_empty() {
            return Ok(SendResult::Skipped(format!(
                "missing whatsapp settings: {}",
                missing.join(", ")
            )));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        );

        let mut delivered = 0;
        let mut failures = Vec::new();
        for to in self.config.to.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            match self.send_to(&url, to, &message.content).await {
                Ok(()) => delivered += 1,
                Err(e) => failures.push(format!("{} ({})", to, e)),
            }
        }

        if delivered == 0 {
            return Ok(SendResult::Failed(failures.join("; ")));
        }
        if !failures.is_empty() {
            warn!(
                channel = "whatsapp",
                delivered,
                failed = %failures.join("; "),
                "Some WhatsApp recipients failed"
            );
        }
        Ok(SendResult::Sent)
    }
}
