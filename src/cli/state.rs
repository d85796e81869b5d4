//! 状态操作命令 - `simulate` / `backdate` / `clear-state`
//!
//! 直接修改状态文件，不连接事件流。守护进程运行时它持有内存中的状态，
//! 下一次落盘会覆盖这里的修改，所以应在守护进程停止时使用。

use crate::config::EngineConfig;
use crate::state::{now_secs, ActivityKey, StateStore};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Monitor ID
    pub monitor_id: String,
    /// 区域名称
    pub zone: String,
}

#[derive(Args, Debug)]
pub struct BackdateArgs {
    /// Monitor ID
    pub monitor_id: String,
    /// 区域名称
    pub zone: String,
    /// 回拨的分钟数，如 `90` 或 `90m`
    #[arg(value_parser = parse_minutes)]
    pub minutes: f64,
}

/// 解析分钟数：非负数字，可带 `m` 后缀
pub fn parse_minutes(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('m').unwrap_or(trimmed).trim();
    let minutes: f64 = number
        .parse()
        .map_err(|_| format!("invalid minutes '{}': expected a number like 90 or 90m", raw))?;
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(format!("minutes must be a non-negative number, got '{}'", raw));
    }
    Ok(minutes)
}

/// 状态文件路径：`--state` 优先，其次是配置中的路径
pub fn resolve_state_path(state: Option<&Path>, config: Option<&EngineConfig>) -> PathBuf {
    match (state, config) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(config)) => config.state_path(),
        (None, None) => crate::config::default_state_path(),
    }
}

fn warn_if_unknown(config: Option<&EngineConfig>, key: &ActivityKey) {
    if let Some(config) = config {
        if config.zone(&key.monitor_id, &key.zone).is_none() {
            warn!(key = %key, "Zone is not configured, the checker will ignore it");
        }
    }
}

/// 把区域的最后活动时间设为当前时间
pub fn handle_simulate(args: &SimulateArgs, store: &StateStore, config: Option<&EngineConfig>) -> Result<()> {
    let key = ActivityKey::new(args.monitor_id.clone(), args.zone.clone());
    warn_if_unknown(config, &key);

    let now = now_secs();
    store.record_activity(&key, now)?;
    info!(key = %key, "Simulated activity");
    println!("Recorded activity for {} at {:.0}", key, now);
    Ok(())
}

/// 把区域的最后活动时间设为 N 分钟之前
pub fn handle_backdate(args: &BackdateArgs, store: &StateStore, config: Option<&EngineConfig>) -> Result<()> {
    let key = ActivityKey::new(args.monitor_id.clone(), args.zone.clone());
    warn_if_unknown(config, &key);

    let at = now_secs() - args.minutes * 60.0;
    store.record_activity(&key, at)?;
    info!(key = %key, minutes = args.minutes, "Backdated activity");
    println!("Backdated {} by {} minutes", key, args.minutes);
    Ok(())
}

/// 清空活动和告警记录
pub fn handle_clear_state(store: &StateStore) -> Result<()> {
    store.clear()?;
    info!(path = %store.path().display(), "State cleared");
    println!("Cleared state at {}", store.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, ZoneConfig};

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("90"), Ok(90.0));
        assert_eq!(parse_minutes("90m"), Ok(90.0));
        assert_eq!(parse_minutes(" 1.5 "), Ok(1.5));
        assert_eq!(parse_minutes("0"), Ok(0.0));
        assert!(parse_minutes("abc").is_err());
        assert!(parse_minutes("-5").is_err());
        assert!(parse_minutes("90h").is_err());
        assert!(parse_minutes("").is_err());
    }

    #[test]
    fn test_backdate_sets_past_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json"));
        let args = BackdateArgs {
            monitor_id: "12".into(),
            zone: "Litter".into(),
            minutes: 90.0,
        };

        let before = now_secs();
        handle_backdate(&args, &store, None).unwrap();

        let seen = store.last_seen(&ActivityKey::new("12", "Litter")).unwrap();
        let expected = before - 90.0 * 60.0;
        assert!((seen - expected).abs() < 5.0, "seen {} expected ~{}", seen, expected);
    }

    #[test]
    fn test_simulate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path);
        let args = SimulateArgs {
            monitor_id: "12".into(),
            zone: "Litter".into(),
        };

        handle_simulate(&args, &store, None).unwrap();
        assert!(store.last_seen(&ActivityKey::new("12", "Litter")).is_some());

        // 落盘后重新打开仍可见
        assert!(!StateStore::open(&path).snapshot().is_empty());

        handle_clear_state(&store).unwrap();
        assert!(StateStore::open(&path).snapshot().is_empty());
    }

    #[test]
    fn test_resolve_state_path_precedence() {
        let mut config = EngineConfig::default();
        config.state_file = Some(PathBuf::from("/tmp/from-config.json"));

        let explicit = PathBuf::from("/tmp/explicit.json");
        assert_eq!(resolve_state_path(Some(&explicit), Some(&config)), explicit);
        assert_eq!(
            resolve_state_path(None, Some(&config)),
            PathBuf::from("/tmp/from-config.json")
        );
    }

    #[test]
    fn test_unknown_zone_still_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json"));
        let mut config = EngineConfig::default();
        let mut monitor = MonitorConfig::default();
        monitor.zones.insert("Litter".into(), ZoneConfig::new("litter", 60.0));
        config.monitors.insert("12".into(), monitor);

        let args = SimulateArgs {
            monitor_id: "99".into(),
            zone: "Nowhere".into(),
        };
        handle_simulate(&args, &store, Some(&config)).unwrap();
        assert!(store.last_seen(&ActivityKey::new("99", "Nowhere")).is_some());
    }
}
