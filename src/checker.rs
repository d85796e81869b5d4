//! 空闲检测 - 定时扫描所有 (monitor, zone)，超过阈值且不在抑制窗口内时告警
//!
//! 告警尝试（不论成功与否）都会占用抑制窗口，避免对故障渠道反复重发。

use crate::config::EngineConfig;
use crate::notification::{idle_alert_message, ChannelOutcome, IdleAlert, NotificationDispatcher};
use crate::state::{now_secs, ActivityKey, StateStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// 正常扫描间隔
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// 出错后提前重试的间隔
pub const ERROR_RETRY_DELAY: Duration = Duration::from_secs(5);

/// 单个区域的判定结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// 从未观察到活动
    NotObserved,
    /// 未超过阈值
    Active { idle_minutes: f64 },
    /// 超过阈值，但仍在抑制窗口内
    Suppressed { idle_minutes: f64 },
    /// 需要告警
    Alert { idle_minutes: f64 },
}

/// 判定是否告警（时间单位：秒 / 分钟）
///
/// 没有历史告警视为"无限久以前"。
pub fn evaluate(
    last_seen: Option<f64>,
    last_alert: Option<f64>,
    now: f64,
    max_inactive_minutes: f64,
    suppress_minutes: f64,
) -> Decision {
    let Some(last_seen) = last_seen else {
        return Decision::NotObserved;
    };

    let idle_minutes = (now - last_seen) / 60.0;
    if idle_minutes <= max_inactive_minutes {
        return Decision::Active { idle_minutes };
    }

    let suppression_elapsed = match last_alert {
        Some(at) => (now - at) / 60.0 > suppress_minutes,
        None => true,
    };

    if suppression_elapsed {
        Decision::Alert { idle_minutes }
    } else {
        Decision::Suppressed { idle_minutes }
    }
}

/// 一次触发的告警
#[derive(Debug, Clone)]
pub struct FiredAlert {
    pub key: ActivityKey,
    pub idle_minutes: f64,
    pub text: String,
    pub outcomes: Vec<ChannelOutcome>,
}

/// 一轮扫描的结果
#[derive(Debug, Default)]
pub struct PassReport {
    pub evaluated: usize,
    pub alerts: Vec<FiredAlert>,
    /// 出错的区域（不影响其他区域）
    pub errors: Vec<(ActivityKey, String)>,
}

/// 空闲检测器
pub struct IdleChecker {
    config: Arc<EngineConfig>,
    store: Arc<StateStore>,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
    error_retry: Duration,
}

impl IdleChecker {
    pub fn new(
        config: Arc<EngineConfig>,
        store: Arc<StateStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            interval: CHECK_INTERVAL,
            error_retry: ERROR_RETRY_DELAY,
        }
    }

    /// 自定义扫描间隔（测试用）
    pub fn with_intervals(mut self, interval: Duration, error_retry: Duration) -> Self {
        self.interval = interval;
        self.error_retry = error_retry;
        self
    }

    /// 以当前时间执行一轮扫描
    pub async fn run_pass(&self) -> PassReport {
        self.run_pass_at(now_secs()).await
    }

    /// 以指定时间执行一轮扫描
    pub async fn run_pass_at(&self, now: f64) -> PassReport {
        let mut report = PassReport::default();
        let suppress = self.config.suppress_minutes;

        for (monitor_id, monitor) in &self.config.monitors {
            let monitor_name = monitor.display_name(monitor_id);

            for (zone_name, zone) in &monitor.zones {
                let key = ActivityKey::new(monitor_id.clone(), zone_name.clone());
                report.evaluated += 1;

                let decision = evaluate(
                    self.store.last_seen(&key),
                    self.store.last_alert(&key),
                    now,
                    zone.max_inactive_minutes,
                    suppress,
                );

                let idle_minutes = match decision {
                    Decision::Alert { idle_minutes } => idle_minutes,
                    Decision::Suppressed { idle_minutes } => {
                        debug!(key = %key, idle_minutes, "Idle but suppressed");
                        continue;
                    }
                    Decision::NotObserved | Decision::Active { .. } => continue,
                };

                let message = idle_alert_message(&IdleAlert {
                    monitor_id,
                    monitor_name: &monitor_name,
                    zone: zone_name,
                    idle_minutes,
                    threshold_minutes: zone.max_inactive_minutes,
                });

                info!(
                    key = %key,
                    idle_minutes = idle_minutes.round(),
                    threshold = zone.max_inactive_minutes,
                    "Zone idle, dispatching alert"
                );

                let outcomes = self.dispatcher.dispatch(&message).await;
                for outcome in &outcomes {
                    debug!(key = %key, channel = %outcome.channel, detail = %outcome.detail(), "Channel outcome");
                }

                // 不论投递是否成功，都记录告警时间；落盘含 fsync，放到阻塞线程池
                let store = self.store.clone();
                let alert_key = key.clone();
                let marked = tokio::task::spawn_blocking(move || store.mark_alert(&alert_key, now))
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|result| result.map_err(|e| e.to_string()));
                if let Err(e) = marked {
                    error!(key = %key, error = %e, "Failed to persist alert timestamp");
                    report.errors.push((key.clone(), e));
                }

                report.alerts.push(FiredAlert {
                    key,
                    idle_minutes,
                    text: message.content,
                    outcomes,
                });
            }
        }

        report
    }

    /// 永久运行；一轮中出现错误时 5 秒后提前重试
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            zones = self.config.zone_count(),
            "Idle checker started"
        );

        loop {
            let report = self.run_pass().await;

            let delay = if report.errors.is_empty() {
                self.interval
            } else {
                warn!(errors = report.errors.len(), "Check pass had errors, retrying early");
                self.error_retry
            };

            sleep(delay).await;
        }
    }
}
