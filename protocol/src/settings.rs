//! 游戏设置
//!
//! 以 JSON 保存在用户配置目录下，文件缺失或损坏时使用默认值。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::log::LogLevel;
use crate::transport::NetworkConfig;
use crate::POLL_INTERVAL_MS;

/// 游戏设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub network: NetworkConfig,
    /// 主循环轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 未设置 RUST_LOG 时的日志级别
    pub log_level: LogLevel,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            poll_interval_ms: POLL_INTERVAL_MS,
            log_level: LogLevel::Info,
        }
    }
}

impl GameSettings {
    /// 获取设置文件路径
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("checkers");
            path.push("settings.json");
            path
        })
    }

    /// 从默认路径加载设置
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            tracing::warn!("无法获取配置目录，使用默认设置");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// 从指定路径加载设置
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("设置文件不存在，使用默认设置");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("已加载设置: {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("设置文件格式无效: {}，使用默认设置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取设置文件: {}，使用默认设置", e);
                Self::default()
            }
        }
    }

    /// 保存到默认路径
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "无法获取配置目录")
        })?;
        self.save_to(&path)
    }

    /// 保存到指定路径
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("设置已保存: {:?}", path);
        Ok(())
    }

    /// 用命令行参数 `host:port` 覆盖地址
    pub fn with_address_override(mut self, address: Option<&str>) -> Self {
        if let Some(address) = address {
            match NetworkConfig::from_address(address) {
                Some(network) => self.network = network,
                None => tracing::warn!("无效地址 {:?}，使用 {}", address, self.network.address()),
            }
        }
        self
    }

    /// 轮询间隔，至少 1 毫秒
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
