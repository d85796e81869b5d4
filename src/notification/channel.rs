//! 通知渠道 trait 定义

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 告警主题，用于渠道内部路由（例如 Telegram 话题）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTopic {
    Litter,
    Drink,
}

impl AlertTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTopic::Litter => "litter",
            AlertTopic::Drink => "drink",
        }
    }
}

/// 通知消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// 消息内容（已格式化）
    pub content: String,
    /// 告警主题
    pub topic: Option<AlertTopic>,
    /// 触发告警的 "monitorId:zoneName"（用于日志）
    pub key: Option<String>,
}

impl NotificationMessage {
    /// 创建简单消息
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            topic: None,
            key: None,
        }
    }

    /// 设置主题
    pub fn with_topic(mut self, topic: Option<AlertTopic>) -> Self {
        self.topic = topic;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（缺少凭据、冷却中、dry-run）
    Skipped(String),
    /// 发送失败
    Failed(String),
}

impl SendResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent)
    }
}

/// 单个渠道的最终结果（只记录日志，不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    pub channel: String,
    pub result: SendResult,
    /// 实际尝试次数（跳过时为 0）
    pub attempts: u32,
}

impl ChannelOutcome {
    pub fn success(&self) -> bool {
        self.result.is_sent()
    }

    pub fn detail(&self) -> String {
        match &self.result {
            SendResult::Sent => "sent".to_string(),
            SendResult::Skipped(reason) => format!("skipped: {}", reason),
            SendResult::Failed(reason) => format!("failed: {}", reason),
        }
    }
}

/// 通知渠道 trait
///
/// 每个渠道自己负责传输和凭据；重试、退避和冷却由 `NotificationDispatcher` 统一处理。
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// 渠道名称（用于日志和冷却记录）
    fn name(&self) -> &str;

    /// 成功发送后的最小间隔，`None` 表示不限流
    fn cooldown(&self) -> Option<Duration> {
        None
    }

    /// 发送一次（不含重试）
    async fn send(&self, message: &NotificationMessage) -> Result<SendResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_message_builder() {
        let msg = NotificationMessage::new("test")
            .with_topic(Some(AlertTopic::Litter))
            .with_key("12:Litter");

        assert_eq!(msg.content, "test");
        assert_eq!(msg.topic, Some(AlertTopic::Litter));
        assert_eq!(msg.key.as_deref(), Some("12:Litter"));
    }

    #[test]
    fn test_outcome_detail() {
        let outcome = ChannelOutcome {
            channel: "slack".to_string(),
            result: SendResult::Failed("HTTP 500".to_string()),
            attempts: 3,
        };
        assert!(!outcome.success());
        assert_eq!(outcome.detail(), "failed: HTTP 500");
    }
}
