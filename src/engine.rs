//! 引擎 - 组装状态存储、通知分发、空闲检测和事件流接入，并发运行两个循环

use crate::checker::IdleChecker;
use crate::config::EngineConfig;
use crate::ingest::{IngestLoop, StreamSettings};
use crate::notification::{NotificationBuilder, NotificationDispatcher};
use crate::state::StateStore;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 引擎共享组件
pub struct Engine {
    config: Arc<EngineConfig>,
    store: Arc<StateStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl Engine {
    /// 根据配置构建；`state_path` 为空时使用配置中的路径
    pub fn build(config: EngineConfig, state_path: Option<PathBuf>, dry_run: bool) -> Result<Self> {
        let path = state_path.unwrap_or_else(|| config.state_path());
        let store = StateStore::open(&path);
        info!(path = %path.display(), "State store opened");

        let dispatcher = NotificationBuilder::new(config.channels.clone())
            .dry_run(dry_run)
            .build()?;

        Ok(Self::new(Arc::new(config), Arc::new(store), Arc::new(dispatcher)))
    }

    pub fn new(
        config: Arc<EngineConfig>,
        store: Arc<StateStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
        }
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn checker(&self) -> IdleChecker {
        IdleChecker::new(self.config.clone(), self.store.clone(), self.dispatcher.clone())
    }

    pub fn ingest(&self) -> IngestLoop {
        IngestLoop::new(
            StreamSettings::from_config(&self.config),
            self.config.clone(),
            self.store.clone(),
        )
    }

    /// 运行直到收到 Ctrl-C
    ///
    /// 每次状态修改都已落盘，退出时不需要额外清理。
    pub async fn run(self) -> Result<()> {
        info!(
            url = %self.config.ws_url,
            monitors = self.config.monitors.len(),
            zones = self.config.zone_count(),
            suppress_minutes = self.config.suppress_minutes,
            "Idle guard starting"
        );

        let checker = tokio::spawn(self.checker().run());
        let ingest = tokio::spawn(self.ingest().run());

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown signal received, exiting");
            }
            result = checker => {
                bail!("idle checker stopped unexpectedly: {:?}", result);
            }
            result = ingest => {
                bail!("stream ingestion stopped unexpectedly: {:?}", result);
            }
        }

        Ok(())
    }
}
