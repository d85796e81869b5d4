//! 具体渠道实现

pub mod slack;
pub mod telegram;
pub mod voice;
pub mod whatsapp;

pub use slack::{SlackChannel, SlackConfig};
pub use telegram::{TelegramChannel, TelegramConfig};
pub use voice::{VoiceChannel, VoiceConfig};
pub use whatsapp::{WhatsAppChannel, WhatsAppConfig};

use anyhow::{Context, Result};
use std::time::Duration;

/// 所有渠道共用的 HTTP 超时
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// 配置中的冷却秒数转换为 Duration（0 或未配置表示不限流）
pub(crate) fn cooldown_from_secs(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
}

/// 截断响应体，避免日志过长
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 120;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
