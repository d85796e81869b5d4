//! 区域匹配 - 把事件归属到配置中的 (monitor, zone)

use super::parser::InboundEvent;
use crate::config::EngineConfig;
use crate::state::ActivityKey;

/// 返回事件匹配到的所有区域
///
/// 未配置的 monitor 直接忽略；关键字为空的区域永远不匹配。关键字原样使用，不去除空白。
pub fn match_zones(config: &EngineConfig, event: &InboundEvent) -> Vec<ActivityKey> {
    let Some(monitor) = config.monitors.get(&event.monitor_id) else {
        return Vec::new();
    };

    let hint = event.zone_hint().to_lowercase();
    monitor
        .zones
        .iter()
        .filter(|(_, zone)| {
            let keyword = zone.keyword.to_lowercase();
            !keyword.is_empty() && hint.contains(&keyword)
        })
        .map(|(zone_name, _)| ActivityKey::new(event.monitor_id.clone(), zone_name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, ZoneConfig};

    fn config() -> EngineConfig {
        let mut monitor = MonitorConfig {
            name: Some("Cage A".to_string()),
            ..Default::default()
        };
        monitor.zones.insert("Litter".to_string(), ZoneConfig::new("litter", 60.0));
        monitor.zones.insert("LitterEdge".to_string(), ZoneConfig::new("zone", 60.0));
        monitor.zones.insert("Drink".to_string(), ZoneConfig::new("water", 60.0));
        monitor.zones.insert("Unused".to_string(), ZoneConfig::new("", 60.0));

        let mut config = EngineConfig::default();
        config.monitors.insert("12".to_string(), monitor);
        config
    }

    fn event(monitor_id: &str, cause: &str) -> InboundEvent {
        InboundEvent {
            event_id: "1".to_string(),
            monitor_id: monitor_id.to_string(),
            cause: cause.to_string(),
            raw_name: String::new(),
        }
    }

    #[test]
    fn test_case_insensitive_match() {
        let keys = match_zones(&config(), &event("12", "Linked: Litter Zone, obj: motion"));
        assert_eq!(
            keys,
            vec![
                ActivityKey::new("12", "Litter"),
                ActivityKey::new("12", "LitterEdge"),
            ]
        );
    }

    #[test]
    fn test_only_hint_is_matched() {
        // "water" 出现在逗号之后，不属于区域提示
        let keys = match_zones(&config(), &event("12", "Linked: Nest, near water"));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_unconfigured_monitor_ignored() {
        assert!(match_zones(&config(), &event("99", "Linked: Litter")).is_empty());
    }

    #[test]
    fn test_keyword_whitespace_is_significant() {
        let mut config = config();
        let monitor = config.monitors.get_mut("12").unwrap();
        monitor.zones.clear();
        monitor.zones.insert("Padded".to_string(), ZoneConfig::new(" litter ", 60.0));

        assert!(match_zones(&config, &event("12", "Linked: Litter Zone")).is_empty());
        assert_eq!(
            match_zones(&config, &event("12", "Linked: Big Litter Box")),
            vec![ActivityKey::new("12", "Padded")]
        );
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let keys = match_zones(&config(), &event("12", "Linked: anything"));
        assert!(keys.is_empty());
    }
}
