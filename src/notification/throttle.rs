//! 渠道限流 - 按渠道记录最近一次成功发送时间
//!
//! 与区域级的告警抑制窗口无关，只用于遵守外部服务的频率限制。

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 渠道冷却记录
#[derive(Debug, Default)]
pub struct ChannelThrottle {
    /// 渠道名 -> 最近一次成功发送时间
    last_sent: HashMap<String, Instant>,
}

impl ChannelThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否仍在冷却期内
    pub fn in_cooldown(&self, channel: &str, cooldown: Duration) -> bool {
        self.in_cooldown_at(channel, cooldown, Instant::now())
    }

    /// 是否仍在冷却期内（带时间戳，用于测试）
    pub fn in_cooldown_at(&self, channel: &str, cooldown: Duration, now: Instant) -> bool {
        match self.last_sent.get(channel) {
            Some(last) => now.saturating_duration_since(*last) < cooldown,
            None => false,
        }
    }

    /// 剩余冷却时间
    pub fn remaining(&self, channel: &str, cooldown: Duration) -> Option<Duration> {
        let last = self.last_sent.get(channel)?;
        cooldown.checked_sub(last.elapsed()).filter(|d| !d.is_zero())
    }

    /// 记录一次成功发送
    pub fn record_sent(&mut self, channel: &str) {
        self.record_sent_at(channel, Instant::now());
    }

    pub fn record_sent_at(&mut self, channel: &str, time: Instant) {
        self.last_sent.insert(channel.to_string(), time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_channel_not_in_cooldown() {
        let throttle = ChannelThrottle::new();
        assert!(!throttle.in_cooldown("whatsapp", Duration::from_secs(60)));
        assert!(throttle.remaining("whatsapp", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_cooldown_window() {
        let mut throttle = ChannelThrottle::new();
        let start = Instant::now();
        throttle.record_sent_at("whatsapp", start);

        let cooldown = Duration::from_secs(120);
        assert!(throttle.in_cooldown_at("whatsapp", cooldown, start + Duration::from_secs(30)));
        assert!(!throttle.in_cooldown_at("whatsapp", cooldown, start + Duration::from_secs(121)));

        // 其他渠道不受影响
        assert!(!throttle.in_cooldown_at("telegram", cooldown, start + Duration::from_secs(30)));
    }

    #[test]
    fn test_cooldown_expires() {
        let mut throttle = ChannelThrottle::new();
        throttle.record_sent("voice");
        assert!(throttle.in_cooldown("voice", Duration::from_millis(100)));

        std::thread::sleep(Duration::from_millis(150));

        assert!(!throttle.in_cooldown("voice", Duration::from_millis(100)));
    }
}
