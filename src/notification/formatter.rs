//! 告警文案

use super::channel::{AlertTopic, NotificationMessage};

/// 空闲告警的上下文
#[derive(Debug, Clone)]
pub struct IdleAlert<'a> {
    pub monitor_id: &'a str,
    pub monitor_name: &'a str,
    pub zone: &'a str,
    pub idle_minutes: f64,
    pub threshold_minutes: f64,
}

/// 根据区域名推断主题
pub fn topic_for_zone(zone: &str) -> Option<AlertTopic> {
    let lower = zone.to_lowercase();
    if lower.contains("litter") {
        Some(AlertTopic::Litter)
    } else if lower.contains("drink") || lower.contains("water") {
        Some(AlertTopic::Drink)
    } else {
        None
    }
}

/// 生成告警文本
///
/// 包含：区域、monitor 名称和 ID、空闲时长（取整分钟）和阈值
pub fn format_idle_alert(alert: &IdleAlert<'_>) -> String {
    let idle = alert.idle_minutes.round();
    let threshold = alert.threshold_minutes.round();

    let headline = match topic_for_zone(alert.zone) {
        Some(AlertTopic::Litter) => format!(
            "🐭 Mouse not in litter zone for {:.0} minutes (threshold {:.0}m)",
            idle, threshold
        ),
        Some(AlertTopic::Drink) => format!(
            "🐭 Mouse not drinking for {:.0} minutes (threshold {:.0}m)",
            idle, threshold
        ),
        None => format!(
            "🐭 No activity in '{}' for {:.0} minutes (threshold {:.0}m)",
            alert.zone, idle, threshold
        ),
    };

    format!(
        "{}\nZone: {}\nMonitor: {} (ID {})",
        headline, alert.zone, alert.monitor_name, alert.monitor_id
    )
}

/// 生成完整的通知消息
pub fn idle_alert_message(alert: &IdleAlert<'_>) -> NotificationMessage {
    NotificationMessage::new(format_idle_alert(alert))
        .with_topic(topic_for_zone(alert.zone))
        .with_key(format!("{}:{}", alert.monitor_id, alert.zone))
}
