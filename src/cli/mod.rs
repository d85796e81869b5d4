//! CLI command handling

pub mod check;
pub mod state;

pub use check::*;
pub use state::*;

use crate::config::{default_config_path, load_config, EngineConfig};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// 命令行未指定时使用默认配置路径
pub fn resolve_config_path(config: Option<&Path>) -> PathBuf {
    config.map(Path::to_path_buf).unwrap_or_else(default_config_path)
}

/// 加载配置，失败即为致命的配置错误
pub fn load_engine_config(config: Option<&Path>) -> Result<EngineConfig> {
    let path = resolve_config_path(config);
    Ok(load_config(&path)?)
}
