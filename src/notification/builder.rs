//! 通知系统构建器 - 根据配置注册启用的渠道

use super::channels::{SlackChannel, TelegramChannel, VoiceChannel, WhatsAppChannel};
use super::dispatcher::{NotificationDispatcher, RetryPolicy};
use crate::config::ChannelsConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// 通知系统构建器
pub struct NotificationBuilder {
    channels: ChannelsConfig,
    retry: RetryPolicy,
    dry_run: bool,
}

impl NotificationBuilder {
    pub fn new(channels: ChannelsConfig) -> Self {
        Self {
            channels,
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 构建 NotificationDispatcher
    pub fn build(self) -> Result<NotificationDispatcher> {
        let mut dispatcher = NotificationDispatcher::new()
            .with_dry_run(self.dry_run)
            .with_retry_policy(self.retry);

        let ChannelsConfig {
            telegram,
            slack,
            whatsapp,
            voice,
        } = self.channels;

        // 1. Telegram
        if telegram.enabled {
            dispatcher.register_channel(Arc::new(TelegramChannel::new(telegram)?));
        } else {
            info!(channel = "telegram", "Channel disabled");
        }

        // 2. Slack
        if slack.enabled {
            dispatcher.register_channel(Arc::new(SlackChannel::new(slack)?));
        } else {
            info!(channel = "slack", "Channel disabled");
        }

        // 3. WhatsApp
        if whatsapp.enabled {
            dispatcher.register_channel(Arc::new(WhatsAppChannel::new(whatsapp)?));
        } else {
            info!(channel = "whatsapp", "Channel disabled");
        }

        // 4. Voice
        if voice.enabled {
            dispatcher.register_channel(Arc::new(VoiceChannel::new(voice)?));
        } else {
            info!(channel = "voice", "Channel disabled");
        }

        if dispatcher.channel_count() == 0 {
            warn!("No notification channels enabled, alerts will only be logged");
        }

        Ok(dispatcher)
    }
}
