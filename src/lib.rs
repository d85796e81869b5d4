//! Idle Guard - 监控区域空闲告警引擎
//!
//! 从事件流接收摄像头区域活动，持久化每个区域的最后活动时间，
//! 超过阈值未活动时通过多个渠道告警。

pub mod checker;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod notification;
pub mod state;

pub use checker::{evaluate, Decision, FiredAlert, IdleChecker, PassReport};
pub use config::{load_config, ChannelsConfig, EngineConfig, MonitorConfig, ZoneConfig};
pub use engine::Engine;
pub use error::{GuardError, GuardResult};
pub use ingest::{process_message, ConnectionState, IngestLoop, InboundEvent, StreamSettings};
pub use notification::{
    NotificationBuilder, NotificationChannel, NotificationDispatcher, NotificationMessage, SendResult,
};
pub use state::{ActivityKey, PersistedState, StateStore};
