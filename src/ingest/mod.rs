//! 事件流接入 - 连接上游事件流，解析事件并记录区域活动

pub mod backoff;
pub mod matcher;
pub mod parser;
pub mod stream;

pub use backoff::Backoff;
pub use matcher::match_zones;
pub use parser::{parse_frame, zone_hint, Frame, InboundEvent};
pub use stream::{ConnectionState, IngestLoop, StreamSettings};

use crate::config::EngineConfig;
use crate::state::StateStore;
use tracing::{debug, info, warn};

/// 处理一条流消息，返回记录到的活动数
///
/// 格式错误的消息只记录日志并丢弃，不修改状态。
pub fn process_message(config: &EngineConfig, store: &StateStore, text: &str, now: f64) -> usize {
    let events = match parse_frame(text) {
        Ok(Frame::AuthReply) => {
            debug!("Ignoring auth reply");
            return 0;
        }
        Ok(Frame::Events(events)) => events,
        Err(e) => {
            warn!(error = %e, "Dropping malformed frame");
            return 0;
        }
    };

    let mut recorded = 0;
    for event in &events {
        for key in match_zones(config, event) {
            if let Err(e) = store.record_activity(&key, now) {
                warn!(key = %key, error = %e, "Failed to persist activity");
            }
            recorded += 1;
            info!(
                monitor = %key.monitor_id,
                zone = %key.zone,
                event_id = %event.event_id,
                cause = %event.cause,
                "Activity recorded"
            );
        }
    }
    recorded
}
