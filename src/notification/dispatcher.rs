//! 通知分发器 - 管理多个渠道，独立重试，按渠道限流

use super::channel::{ChannelOutcome, NotificationChannel, NotificationMessage, SendResult};
use super::throttle::ChannelThrottle;
use crate::error::GuardError;
use futures_util::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次失败后的最大重试次数
    pub max_retries: u32,
    /// 首次退避时长
    pub initial_backoff: Duration,
    /// 退避倍数
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(700),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 第 n 次重试前的等待时长（n 从 0 开始）
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.initial_backoff
            .mul_f64(self.backoff_multiplier.powi(retry as i32))
    }
}

/// 通知分发器
pub struct NotificationDispatcher {
    /// 所有注册的渠道
    channels: Vec<Arc<dyn NotificationChannel>>,
    retry: RetryPolicy,
    throttle: Mutex<ChannelThrottle>,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    /// 创建新的分发器
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            retry: RetryPolicy::default(),
            throttle: Mutex::new(ChannelThrottle::new()),
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 注册渠道
    pub fn register_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        info!(
            channel = channel.name(),
            cooldown_secs = ?channel.cooldown().map(|d| d.as_secs_f64()),
            "Registering notification channel"
        );
        self.channels.push(channel);
    }

    /// 获取已注册的渠道数量
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 获取已注册的渠道名称
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// 发送到所有渠道，全部完成（或重试耗尽）后返回
    ///
    /// 各渠道并发执行，一个渠道失败不影响其他渠道。
    pub async fn dispatch(&self, message: &NotificationMessage) -> Vec<ChannelOutcome> {
        if self.channels.is_empty() {
            warn!(key = ?message.key, "No notification channels registered, alert not delivered");
            return Vec::new();
        }

        let sends = self
            .channels
            .iter()
            .map(|channel| self.deliver(channel.as_ref(), message));
        join_all(sends).await
    }

    async fn deliver(
        &self,
        channel: &dyn NotificationChannel,
        message: &NotificationMessage,
    ) -> ChannelOutcome {
        let name = channel.name().to_string();

        if self.dry_run {
            info!(channel = %name, key = ?message.key, "[DRY-RUN] Would send alert");
            return ChannelOutcome {
                channel: name,
                result: SendResult::Skipped("dry-run".to_string()),
                attempts: 0,
            };
        }

        if let Some(cooldown) = channel.cooldown() {
            let remaining = {
                let throttle = self.throttle.lock().unwrap();
                if throttle.in_cooldown(&name, cooldown) {
                    Some(throttle.remaining(&name, cooldown).unwrap_or_default())
                } else {
                    None
                }
            };
            if let Some(remaining) = remaining {
                info!(
                    channel = %name,
                    remaining_secs = remaining.as_secs(),
                    "Channel in cooldown, skipping"
                );
                return ChannelOutcome {
                    channel: name,
                    result: SendResult::Skipped("cooldown".to_string()),
                    attempts: 0,
                };
            }
        }

        let mut attempts = 0;
        let result = loop {
            let retry = attempts;
            attempts += 1;

            let result = match channel.send(message).await {
                Ok(result) => result,
                Err(e) => SendResult::Failed(format!("{:#}", e)),
            };

            match result {
                SendResult::Failed(reason) if retry < self.retry.max_retries => {
                    let backoff = self.retry.backoff_for(retry);
                    warn!(
                        channel = %name,
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %reason,
                        "Channel send failed, retrying"
                    );
                    sleep(backoff).await;
                }
                other => break other,
            }
        };

        match &result {
            SendResult::Sent => {
                if channel.cooldown().is_some() {
                    self.throttle.lock().unwrap().record_sent(&name);
                }
                info!(channel = %name, key = ?message.key, attempts, "Alert delivered");
            }
            SendResult::Skipped(reason) => {
                info!(channel = %name, reason = %reason, "Channel skipped alert");
            }
            SendResult::Failed(reason) => {
                let err = GuardError::ChannelDelivery {
                    channel: name.clone(),
                    detail: reason.clone(),
                };
                error!(attempts, error = %err, "Giving up on channel for this alert");
            }
        }

        ChannelOutcome {
            channel: name,
            result,
            attempts,
        }
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
