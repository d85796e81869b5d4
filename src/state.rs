//! 持久化状态 - 每个 (monitor, zone) 的最后活动时间和最后告警时间
//!
//! 所有修改都在同一把锁内完成，并在释放锁之前立即落盘（write-through）。
//! 落盘方式为写临时文件再 rename，读者不会看到写了一半的文件。
//!
//! 同一个状态文件只能由一个进程实例使用；多实例并发写入时以最后一次 rename 为准。

use crate::error::{GuardError, GuardResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// 当前 Unix 时间（秒，带小数）
pub fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// 区域唯一标识 (monitorId, zoneName)，大小写敏感
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityKey {
    pub monitor_id: String,
    pub zone: String,
}

impl ActivityKey {
    pub fn new(monitor_id: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            monitor_id: monitor_id.into(),
            zone: zone.into(),
        }
    }
}

/// 状态文件中的键格式 "monitorId:zoneName"
impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.monitor_id, self.zone)
    }
}

/// 状态文件内容，两张表作为一个整体读写
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// "monitorId:zoneName" -> 最后活动时间
    #[serde(default)]
    pub last_seen: BTreeMap<String, f64>,
    /// "monitorId:zoneName" -> 最后告警时间
    #[serde(default)]
    pub last_alert: BTreeMap<String, f64>,
}

impl PersistedState {
    pub fn last_seen(&self, key: &ActivityKey) -> Option<f64> {
        self.last_seen.get(&key.to_string()).copied()
    }

    pub fn last_alert(&self, key: &ActivityKey) -> Option<f64> {
        self.last_alert.get(&key.to_string()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty() && self.last_alert.is_empty()
    }
}

/// 读取状态文件。文件不存在、无法读取或内容损坏时返回空状态
pub fn load(path: &Path) -> PersistedState {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Cannot read state file, starting empty");
            }
            return PersistedState::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(state) => state,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file is corrupt, starting empty");
            PersistedState::default()
        }
    }
}

/// 原子写入状态文件（临时文件 + rename）
pub fn save(path: &Path, state: &PersistedState) -> GuardResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| GuardError::io(format!("create {}", parent.display()), e))?;
        }
    }

    let json = serde_json::to_string(state)
        .map_err(|e| GuardError::parse(format!("serialize state: {}", e)))?;

    let temp_path = path.with_extension("tmp");
    {
        let mut temp_file = File::create(&temp_path)
            .map_err(|e| GuardError::io(format!("create {}", temp_path.display()), e))?;
        temp_file
            .write_all(json.as_bytes())
            .and_then(|_| temp_file.sync_all())
            .map_err(|e| GuardError::io(format!("write {}", temp_path.display()), e))?;
    }

    fs::rename(&temp_path, path)
        .map_err(|e| GuardError::io(format!("rename into {}", path.display()), e))?;

    debug!(path = %path.display(), "State saved");
    Ok(())
}

/// 共享状态存储，两个循环共用一把锁
pub struct StateStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl StateStore {
    /// 打开状态文件（不存在时为空状态）
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load(&path);
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前状态的拷贝
    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().unwrap().clone()
    }

    pub fn last_seen(&self, key: &ActivityKey) -> Option<f64> {
        self.state.lock().unwrap().last_seen(key)
    }

    pub fn last_alert(&self, key: &ActivityKey) -> Option<f64> {
        self.state.lock().unwrap().last_alert(key)
    }

    /// 记录活动时间
    pub fn record_activity(&self, key: &ActivityKey, at: f64) -> GuardResult<()> {
        self.mutate(|state| {
            state.last_seen.insert(key.to_string(), at);
        })
    }

    /// 记录告警时间
    pub fn mark_alert(&self, key: &ActivityKey, at: f64) -> GuardResult<()> {
        self.mutate(|state| {
            state.last_alert.insert(key.to_string(), at);
        })
    }

    /// 清空两张表
    pub fn clear(&self) -> GuardResult<()> {
        self.mutate(|state| {
            state.last_seen.clear();
            state.last_alert.clear();
        })
    }

    /// 在锁内修改并立即落盘。落盘失败时内存中的修改保留，下一次修改会再次整体写入
    fn mutate<F>(&self, f: F) -> GuardResult<()>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut state = self.state.lock().unwrap();
        f(&mut state);
        save(&self.path, &state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_key_format() {
        let key = ActivityKey::new("12", "Litter");
        assert_eq!(key.to_string(), "12:Litter");
        assert_eq!(ActivityKey::new("7", "Zone:A").to_string(), "7:Zone:A");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = load(&dir.path().join("state.json"));
        assert!(state.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{\"last_seen\": {\"12:Litter\": ").unwrap();
        assert!(load(&path).is_empty());
    }

    #[test]
    fn test_load_partial_document_fills_missing_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"last_seen": {"12:Litter": 1700000000.5}}"#).unwrap();
        let state = load(&path);
        assert_eq!(state.last_seen(&ActivityKey::new("12", "Litter")), Some(1700000000.5));
        assert!(state.last_alert.is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut state = PersistedState::default();
        state.last_alert.insert("1:A".to_string(), 42.0);

        save(&path, &state).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load(&path), state);
    }

    #[test]
    fn test_store_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path);
        let key = ActivityKey::new("12", "Litter");

        store.record_activity(&key, 100.0).unwrap();
        store.mark_alert(&key, 200.0).unwrap();

        // 另一个实例从磁盘读取，应看到相同内容
        let reopened = StateStore::open(&path);
        assert_eq!(reopened.last_seen(&key), Some(100.0));
        assert_eq!(reopened.last_alert(&key), Some(200.0));

        store.clear().unwrap();
        assert!(load(&path).is_empty());
    }
}
