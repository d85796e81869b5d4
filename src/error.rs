//! 错误分类
//!
//! - `Config`: 启动时配置缺失或非法，进程直接退出
//! - `TransientIo`: 连接 / 读写 / 状态文件写入失败，记录日志后重试
//! - `Parse`: 单条消息或事件格式错误，丢弃该单元继续处理
//! - `ChannelDelivery`: 某个通知渠道重试耗尽，不影响其他渠道

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("config error: {0}")]
    Config(String),

    #[error("transient I/O error ({context}): {source}")]
    TransientIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("channel {channel} delivery failed: {detail}")]
    ChannelDelivery { channel: String, detail: String },
}

impl GuardError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::TransientIo {
            context: context.into(),
            source,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

pub type GuardResult<T> = std::result::Result<T, GuardError>;
