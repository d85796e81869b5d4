//! 语音电话渠道（Twilio Calls API + Twimlet 文本转语音）

use super::{cooldown_from_secs, http_client, truncate_body};
use crate::notification::channel::{NotificationChannel, NotificationMessage, SendResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_cooldown() -> Option<f64> {
    Some(600.0)
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_twiml_url() -> String {
    "http://twimlets.com/message".to_string()
}

/// 语音渠道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// 电话比较打扰，默认 10 分钟冷却
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: Option<f64>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_twiml_url")]
    pub twiml_url: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            to: String::new(),
            cooldown_secs: default_cooldown(),
            api_base: default_api_base(),
            twiml_url: default_twiml_url(),
        }
    }
}

/// 语音渠道
pub struct VoiceChannel {
    config: VoiceConfig,
    client: reqwest::Client,
}

impl VoiceChannel {
    pub fn new(config: VoiceConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }

    /// 朗读文本的 TwiML 地址
    fn twiml_url(&self, text: &str) -> Result<Url> {
        Url::parse_with_params(&self.config.twiml_url, &[("Message", text)])
            .with_context(|| format!("invalid twiml_url '{}'", self.config.twiml_url))
    }
}

#[async_trait]
impl NotificationChannel for VoiceChannel {
    fn name(&self) -> &str {
        "voice"
    }

    fn cooldown(&self) -> Option<Duration> {
        cooldown_from_secs(self.config.cooldown_secs)
    }

    async fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        let c = &self.config;
        if c.account_sid.is_empty() || c.auth_token.is_empty() || c.from.is_empty() || c.to.is_empty() {
            return Ok(SendResult::Skipped("missing voice call settings".to_string()));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            c.api_base.trim_end_matches('/'),
            c.account_sid
        );
        let twiml = self.twiml_url(&message.content)?;

        let response = self
            .client
            .post(&url)
            .basic_auth(&c.account_sid, Some(&c.auth_token))
            .form(&[("To", c.to.as_str()), ("From", c.from.as_str()), ("Url", twiml.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
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
