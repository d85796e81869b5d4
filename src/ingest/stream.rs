//! 事件流客户端 - 断线重连的 WebSocket 读循环
//!
//! 状态机：Disconnected -> Connecting -> Connected -> Disconnected -> Backoff -> Connecting ...
//! 没有终止状态，进程退出前一直运行。
//!
//! 投递语义：每个连接会话内至多一次；断线期间上游未送达的事件不会补发。

use super::backoff::{self, Backoff};
use super::process_message;
use crate::config::EngineConfig;
use crate::state::{now_secs, StateStore};
use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

/// 连接参数
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
    /// 超过该时长没有收到任何消息视为连接已死
    pub read_timeout: Duration,
    pub ping_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl StreamSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            user: config.ws_user.clone(),
            password: config.ws_password.clone(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(300),
            ping_interval: Duration::from_secs(30),
            backoff_base: backoff::DEFAULT_BASE,
            backoff_cap: backoff::DEFAULT_CAP,
        }
    }

    /// 认证帧；上游关闭认证时空凭据同样有效
    pub fn auth_frame(&self) -> String {
        serde_json::json!({
            "event": "auth",
            "data": {"user": self.user, "password": self.password}
        })
        .to_string()
    }
}

/// 接入循环
pub struct IngestLoop {
    settings: StreamSettings,
    config: Arc<EngineConfig>,
    store: Arc<StateStore>,
    state: ConnectionState,
}

impl IngestLoop {
    pub fn new(settings: StreamSettings, config: Arc<EngineConfig>, store: Arc<StateStore>) -> Self {
        Self {
            settings,
            config,
            store,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Stream state change");
            self.state = next;
        }
    }

    /// 永久运行：任何连接错误都只记录日志，退避后重连
    pub async fn run(mut self) {
        let mut backoff = Backoff::new(self.settings.backoff_base, self.settings.backoff_cap);

        loop {
            if let Err(e) = self.run_session(&mut backoff).await {
                warn!(url = %self.settings.url, error = %format!("{:#}", e), "Stream connection lost");
            }
            self.transition(ConnectionState::Disconnected);

            let delay = backoff.next_delay();
            self.transition(ConnectionState::Backoff);
            info!(delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");
            sleep(delay).await;
        }
    }

    /// 一次连接会话：连接、认证、读取直到出错
    async fn run_session(&mut self, backoff: &mut Backoff) -> Result<()> {
        self.transition(ConnectionState::Connecting);
        info!(url = %self.settings.url, "Connecting to event stream");

        let (mut ws, _) = timeout(self.settings.connect_timeout, connect_async(self.settings.url.as_str()))
            .await
            .map_err(|_| anyhow!("connect timed out after {:?}", self.settings.connect_timeout))??;

        ws.send(Message::Text(self.settings.auth_frame())).await?;

        self.transition(ConnectionState::Connected);
        backoff.reset();
        info!(url = %self.settings.url, "Connected to event stream");

        let mut ping = tokio::time::interval_at(
            Instant::now() + self.settings.ping_interval,
            self.settings.ping_interval,
        );
        let mut deadline = Instant::now() + self.settings.read_timeout;

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    ws.send(Message::Ping(Vec::new())).await?;
                }
                _ = sleep_until(deadline) => {
                    bail!("no message received for {:?}", self.settings.read_timeout);
                }
                msg = ws.next() => {
                    deadline = Instant::now() + self.settings.read_timeout;
                    match msg {
                        None => bail!("stream closed"),
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(text).await;
                        }
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => self.handle_text(text).await,
                            Err(_) => warn!("Dropping non UTF-8 binary frame"),
                        },
                        Some(Ok(Message::Close(frame))) => bail!("server closed stream: {:?}", frame),
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    /// 状态落盘含 fsync，放到阻塞线程池执行；逐条等待以保持消息顺序
    async fn handle_text(&self, text: String) {
        if text.trim().is_empty() {
            return;
        }
        debug!(len = text.len(), "Received frame");

        let config = self.config.clone();
        let store = self.store.clone();
        let now = now_secs();
        if let Err(e) =
            tokio::task::spawn_blocking(move || process_message(&config, &store, &text, now)).await
        {
            warn!(error = %e, "Frame processing task failed");
        }
    }
}
