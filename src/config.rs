//! 引擎配置 - monitors → zones → 阈值/关键字，启动时加载一次，之后只读
//!
//! 支持 YAML (`.yaml`/`.yml`)、JSON (`.json`) 和 TOML (`.toml`)。敏感凭据可以通过环境变量覆盖，
//! 覆盖只在 `load_config` 中执行一次，组件内部不再读取环境变量。

use crate::error::{GuardError, GuardResult};
use crate::notification::channels::{SlackConfig, TelegramConfig, VoiceConfig, WhatsAppConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:9000";
pub const DEFAULT_SUPPRESS_MINUTES: f64 = 30.0;
pub const DEFAULT_MAX_INACTIVE_MINUTES: f64 = 60.0;

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

fn default_suppress_minutes() -> f64 {
    DEFAULT_SUPPRESS_MINUTES
}

fn default_max_inactive_minutes() -> f64 {
    DEFAULT_MAX_INACTIVE_MINUTES
}

/// 单个区域配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// 关键字（大小写不敏感的子串匹配）
    #[serde(default)]
    pub keyword: String,
    /// 最长允许的无活动时间（分钟）
    #[serde(default = "default_max_inactive_minutes")]
    pub max_inactive_minutes: f64,
}

impl ZoneConfig {
    pub fn new(keyword: impl Into<String>, max_inactive_minutes: f64) -> Self {
        Self {
            keyword: keyword.into(),
            max_inactive_minutes,
        }
    }
}

/// 单个摄像头（monitor）配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 显示名称
    #[serde(default)]
    pub name: Option<String>,
    /// zoneName -> ZoneConfig
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneConfig>,
}

impl MonitorConfig {
    /// 显示名称，缺省为 "Monitor <id>"
    pub fn display_name(&self, monitor_id: &str) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Monitor {}", monitor_id),
        }
    }
}

/// 所有通知渠道配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 事件流地址
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub ws_user: String,
    #[serde(default)]
    pub ws_password: String,
    /// 同一区域两次告警之间的最小间隔（分钟）
    #[serde(default = "default_suppress_minutes")]
    pub suppress_minutes: f64,
    /// 状态文件路径
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// monitorId -> MonitorConfig
    #[serde(default)]
    pub monitors: BTreeMap<String, MonitorConfig>,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            ws_user: String::new(),
            ws_password: String::new(),
            suppress_minutes: DEFAULT_SUPPRESS_MINUTES,
            state_file: None,
            monitors: BTreeMap::new(),
            channels: ChannelsConfig::default(),
        }
    }
}

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// 根据扩展名判断格式
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// 默认配置目录 ~/.config/idle-guard
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("idle-guard")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("rules.yaml")
}

pub fn default_state_path() -> PathBuf {
    default_config_dir().join("state.json")
}

/// 从文件加载配置（读取 → 解析 → 环境变量覆盖 → 校验）
pub fn load_config(path: &Path) -> GuardResult<EngineConfig> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| {
        GuardError::config(format!(
            "unsupported config format for {} (expected .yaml, .json or .toml)",
            path.display()
        ))
    })?;

    let content = fs::read_to_string(path)
        .map_err(|e| GuardError::config(format!("cannot read {}: {}", path.display(), e)))?;

    let mut config = EngineConfig::parse(&content, format)?;
    config.apply_env_overrides(|name| std::env::var(name).ok());
    config.validate()?;

    info!(
        path = %path.display(),
        monitors = config.monitors.len(),
        zones = config.zone_count(),
        "Loaded configuration"
    );
    Ok(config)
}

impl EngineConfig {
    /// 仅解析，不做环境变量覆盖和校验
    pub fn parse(content: &str, format: ConfigFormat) -> GuardResult<Self> {
        match format {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| GuardError::config(format!("invalid JSON config: {}", e))),
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| GuardError::config(format!("invalid TOML config: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| GuardError::config(format!("invalid YAML config: {}", e))),
        }
    }

    /// 状态文件路径，未配置时使用默认路径
    pub fn state_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(default_state_path)
    }

    pub fn zone_count(&self) -> usize {
        self.monitors.values().map(|m| m.zones.len()).sum()
    }

    /// 查找区域配置
    pub fn zone(&self, monitor_id: &str, zone_name: &str) -> Option<&ZoneConfig> {
        self.monitors.get(monitor_id)?.zones.get(zone_name)
    }

    /// 校验结构和取值
    pub fn validate(&self) -> GuardResult<()> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(GuardError::config(format!(
                "ws_url must start with ws:// or wss://, got '{}'",
                self.ws_url
            )));
        }

        if !self.suppress_minutes.is_finite() || self.suppress_minutes < 0.0 {
            return Err(GuardError::config(format!(
                "suppress_minutes must be >= 0, got {}",
                self.suppress_minutes
            )));
        }

        if self.monitors.is_empty() {
            return Err(GuardError::config("monitors must not be empty"));
        }

        for (monitor_id, monitor) in &self.monitors {
            if monitor_id.trim().is_empty() {
                return Err(GuardError::config("monitor id must not be empty"));
            }
            if monitor.zones.is_empty() {
                warn!(monitor = %monitor_id, "Monitor has no zones configured");
            }
            for (zone_name, zone) in &monitor.zones {
                if zone_name.trim().is_empty() {
                    return Err(GuardError::config(format!(
                        "monitor {} has a zone with an empty name",
                        monitor_id
                    )));
                }
                if !zone.max_inactive_minutes.is_finite() || zone.max_inactive_minutes <= 0.0 {
                    return Err(GuardError::config(format!(
                        "{}:{} max_inactive_minutes must be > 0, got {}",
                        monitor_id, zone_name, zone.max_inactive_minutes
                    )));
                }
                if zone.keyword.is_empty() {
                    warn!(monitor = %monitor_id, zone = %zone_name, "Zone keyword is empty, it will never match");
                }
            }
        }

        let cooldowns = [
            ("telegram", self.channels.telegram.cooldown_secs),
            ("slack", self.channels.slack.cooldown_secs),
            ("whatsapp", self.channels.whatsapp.cooldown_secs),
            ("voice", self.channels.voice.cooldown_secs),
        ];
        for (channel, cooldown) in cooldowns {
            if let Some(secs) = cooldown {
                if !secs.is_finite() || secs < 0.0 {
                    return Err(GuardError::config(format!(
                        "{} cooldown_secs must be >= 0, got {}",
                        channel, secs
                    )));
                }
            }
        }

        Ok(())
    }

    /// 用环境变量覆盖连接参数和渠道凭据
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| clean_env_value(&v)).filter(|v| !v.is_empty());

        if let Some(v) = get("WS_URL") {
            self.ws_url = v;
        }
        if let Some(v) = get("ES_USER") {
            self.ws_user = v;
        }
        if let Some(v) = get("ES_PASSWORD") {
            self.ws_password = v;
        }

        let telegram = &mut self.channels.telegram;
        if let Some(v) = get("TELEGRAM_TOKEN") {
            telegram.token = v;
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            telegram.chat_id = v;
        }
        if let Some(v) = get("TELEGRAM_THREAD_ID") {
            telegram.thread_id = Some(v);
        }
        if let Some(v) = get("TELEGRAM_THREAD_ID_LITTER") {
            telegram.topic_threads.insert("litter".to_string(), v);
        }
        if let Some(v) = get("TELEGRAM_THREAD_ID_DRINK") {
            telegram.topic_threads.insert("drink".to_string(), v);
        }

        if let Some(v) = get("SLACK_WEBHOOK_URL") {
            self.channels.slack.webhook_url = v;
        }

        let sid = get("TWILIO_ACCOUNT_SID");
        let token = get("TWILIO_AUTH_TOKEN");

        let whatsapp = &mut self.channels.whatsapp;
        if let Some(v) = get("WHATSAPP_ENABLED").or_else(|| get("ENABLE_WHATSAPP")) {
            whatsapp.enabled = parse_flag(&v);
        }
        if let Some(v) = &sid {
            whatsapp.account_sid = v.clone();
        }
        if let Some(v) = &token {
            whatsapp.auth_token = v.clone();
        }
        if let Some(v) = get("WHATSAPP_FROM").or_else(|| get("TWILIO_WHATSAPP_FROM")) {
            whatsapp.from = v;
        }
        if let Some(v) = get("WHATSAPP_TO") {
            whatsapp.to = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let voice = &mut self.channels.voice;
        if let Some(v) = get("ENABLE_VOICE_CALL") {
            voice.enabled = parse_flag(&v);
        }
        if let Some(v) = sid {
            voice.account_sid = v;
        }
        if let Some(v) = token {
            voice.auth_token = v;
        }
        if let Some(v) = get("TWILIO_VOICE_FROM") {
            voice.from = v;
        }
        if let Some(v) = get("VOICE_CALL_TO") {
            voice.to = v;
        }
    }
}

/// 清理环境变量值：去掉首尾空白、一对匹配的引号和换行
pub fn clean_env_value(raw: &str) -> String {
    let mut v = raw.trim();
    if v.len() >= 2
        && ((v.starts_with('\'') && v.ends_with('\'')) || (v.starts_with('"') && v.ends_with('"')))
    {
        v = &v[1..v.len() - 1];
    }
    v.replace(['\r', '\n'], "").trim().to_string()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
