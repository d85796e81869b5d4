//! 通知抽象层 - 统一管理所有通知渠道
//!
//! # 设计目标
//! 1. 统一接口：所有渠道实现 `NotificationChannel` trait
//! 2. 渠道解耦：每个渠道独立发送、独立重试，互不影响
//! 3. 按渠道限流：`cooldown()` 非空的渠道在冷却期内跳过
//!
//! # 使用示例
//! ```ignore
//! use idle_guard::notification::{NotificationBuilder, NotificationMessage};
//!
//! let dispatcher = NotificationBuilder::new(config.channels.clone()).build()?;
//! let outcomes = dispatcher.dispatch(&NotificationMessage::new("Hello")).await;
//! ```

pub mod builder;
pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod formatter;
pub mod throttle;

pub use builder::NotificationBuilder;
pub use channel::{AlertTopic, ChannelOutcome, NotificationChannel, NotificationMessage, SendResult};
pub use dispatcher::{NotificationDispatcher, RetryPolicy};
pub use formatter::{format_idle_alert, idle_alert_message, topic_for_zone, IdleAlert};
pub use throttle::ChannelThrottle;
