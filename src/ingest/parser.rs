//! 事件流消息解析 - 把松散的上游 JSON 规范化为 `InboundEvent`
//!
//! 上游格式不固定：可能是单个事件，也可能是 `events` / `Events` / `items` 下的批量事件，
//! 字段名也有多种写法。所有兼容逻辑集中在这里，业务代码只看到严格的 `InboundEvent`。

use crate::error::{GuardError, GuardResult};
use serde_json::{Map, Value};
use tracing::debug;

const BATCH_KEYS: [&str; 3] = ["events", "Events", "items"];
const EVENT_ID_KEYS: [&str; 5] = ["eid", "event_id", "EventID", "eventId", "EventId"];
const MONITOR_ID_KEYS: [&str; 5] = ["mid", "monitor_id", "MonitorID", "monitorId", "MonitorId"];
const CAUSE_KEYS: [&str; 2] = ["cause", "Cause"];
const NAME_KEYS: [&str; 2] = ["name", "Name"];

/// 规范化后的入站事件（不持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub event_id: String,
    pub monitor_id: String,
    pub cause: String,
    pub raw_name: String,
}

impl InboundEvent {
    /// 从 cause 中提取的区域提示
    pub fn zone_hint(&self) -> String {
        zone_hint(&self.cause)
    }
}

/// 一条流消息的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 认证回执（NOAUTH / BADAUTH 等都不算错误）
    AuthReply,
    /// 0 个或多个事件
    Events(Vec<InboundEvent>),
}

/// 解析一条文本消息
///
/// 整条消息不是 JSON 对象时返回 `Parse` 错误；批量中单个事件不合法时只跳过该事件。
pub fn parse_frame(text: &str) -> GuardResult<Frame> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| GuardError::parse(format!("invalid JSON frame: {}", e)))?;

    let doc = value
        .as_object()
        .ok_or_else(|| GuardError::parse("frame is not a JSON object"))?;

    if doc
        .get("event")
        .and_then(Value::as_str)
        .map(|e| e.eq_ignore_ascii_case("auth"))
        .unwrap_or(false)
    {
        return Ok(Frame::AuthReply);
    }

    Ok(Frame::Events(normalize_events(doc)))
}

/// 把一个消息对象展开为事件列表
pub fn normalize_events(doc: &Map<String, Value>) -> Vec<InboundEvent> {
    let mut batch: Vec<&Value> = Vec::new();
    for key in BATCH_KEYS {
        if let Some(Value::Array(items)) = doc.get(key) {
            batch.extend(items.iter());
        }
    }

    if batch.is_empty() {
        return normalize_event(doc, doc).into_iter().collect();
    }

    batch
        .into_iter()
        .filter_map(|item| match item.as_object() {
            Some(obj) => normalize_event(obj, doc),
            None => {
                debug!(item = %item, "Dropping non-object batch entry");
                None
            }
        })
        .collect()
}

/// 单个事件；缺少事件 ID 或 monitor ID 时返回 None
fn normalize_event(obj: &Map<String, Value>, doc: &Map<String, Value>) -> Option<InboundEvent> {
    let event_id = first_id(obj, &EVENT_ID_KEYS).or_else(|| first_id(doc, &["eid"]));
    let monitor_id =
        first_id(obj, &MONITOR_ID_KEYS).or_else(|| first_id(doc, &["mid", "monitor_id"]));

    let (event_id, monitor_id) = match (event_id, monitor_id) {
        (Some(e), Some(m)) => (e, m),
        _ => {
            debug!("Dropping event without event id or monitor id");
            return None;
        }
    };

    let cause = first_text(obj, &CAUSE_KEYS)
        .or_else(|| first_text(doc, &["cause"]))
        .unwrap_or_default();
    let raw_name = first_text(obj, &NAME_KEYS)
        .or_else(|| first_text(doc, &["name"]))
        .unwrap_or_default();

    Some(InboundEvent {
        event_id,
        monitor_id,
        cause,
        raw_name,
    })
}

/// ID 字段：字符串或数字，空字符串视为缺失
fn first_id(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// 从 cause 中提取区域提示
///
/// `"Linked: Litter Zone, obj: motion"` -> `"Litter Zone"`：取第一个冒号之后、第一个逗号之前的部分。
/// 没有冒号时使用整个 cause。
pub fn zone_hint(cause: &str) -> String {
    match cause.split_once(':') {
        Some((_, rest)) => rest.split(',').next().unwrap_or("").trim().to_string(),
        None => cause.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(text: &str) -> Vec<InboundEvent> {
        match parse_frame(text).unwrap() {
            Frame::Events(events) => events,
            Frame::AuthReply => panic!("unexpected auth reply"),
        }
    }

    #[test]
    fn test_zone_hint() {
        assert_eq!(zone_hint("Linked: Litter Zone, obj: motion"), "Litter Zone");
        assert_eq!(zone_hint("Motion: Drink"), "Drink");
        assert_eq!(zone_hint("  Forced Web  "), "Forced Web");
        assert_eq!(zone_hint(""), "");
        assert_eq!(zone_hint("Linked:"), "");
    }

    #[test]
    fn test_single_event_frame() {
        let parsed = events(r#"{"eid": 101, "mid": "12", "cause": "Linked: Litter Zone, obj: motion", "name": "Event-101"}"#);
        assert_eq!(
            parsed,
            vec![InboundEvent {
                event_id: "101".to_string(),
                monitor_id: "12".to_string(),
                cause: "Linked: Litter Zone, obj: motion".to_string(),
                raw_name: "Event-101".to_string(),
            }]
        );
        assert_eq!(parsed[0].zone_hint(), "Litter Zone");
    }

    #[test]
    fn test_batch_with_alternate_keys() {
        let parsed = events(
            r#"{
                "event": "alarm",
                "cause": "Motion: Drink",
                "events": [
                    {"EventID": "1", "MonitorID": 3},
                    {"event_id": "2", "monitorId": "4", "Cause": "Linked: Nest"}
                ],
                "items": [{"eventId": "3", "monitor_id": "5", "Name": "x"}]
            }"#,
        );
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].monitor_id, "3");
        // 事件自身没有 cause 时回退到外层
        assert_eq!(parsed[0].cause, "Motion: Drink");
        assert_eq!(parsed[1].cause, "Linked: Nest");
        assert_eq!(parsed[2].raw_name, "x");
    }

    #[test]
    fn test_malformed_entries_skipped_without_aborting_batch() {
        let parsed = events(
            r#"{"Events": [
                "garbage",
                {"eid": "", "mid": "1"},
                {"eid": "9", "mid": null},
                {"eid": {"nested": true}, "mid": "1"},
                {"eid": "10", "mid": "1", "cause": "Linked: Litter"}
            ]}"#,
        );
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].event_id, "10");
    }

    #[test]
    fn test_frame_level_fallback_ids() {
        let parsed = events(r#"{"events": [{"cause": "Linked: Litter"}], "eid": "5", "monitor_id": "8"}"#);
        assert_eq!(parsed[0].event_id, "5");
        assert_eq!(parsed[0].monitor_id, "8");
    }

    #[test]
    fn test_event_without_ids_is_dropped() {
        assert!(events(r#"{"status": "Success"}"#).is_empty());
    }

    #[test]
    fn test_auth_reply() {
        assert_eq!(
            parse_frame(r#"{"event": "Auth", "type": "", "status": "Fail", "reason": "NOAUTH"}"#).unwrap(),
            Frame::AuthReply
        );
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(parse_frame("{not json"), Err(GuardError::Parse(_))));
        assert!(matches!(parse_frame("[1, 2]"), Err(GuardError::Parse(_))));
    }
}
