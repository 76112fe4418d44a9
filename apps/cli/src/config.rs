//! CLI 配置文件
//!
//! ```toml
//! [connection]
//! address = "127.0.0.1:50002"
//!
//! [driver]
//! ack_timeout_ms = 100
//!
//! [controller]
//! fallback_zone = "blue"
//!
//! [controller.pid]
//! kp = 1.2
//! ```
//!
//! 所有段落与字段均可省略，缺省取内置默认值。

use anyhow::{Context, Result, anyhow};
use cropdrop_control::MissionConfig;
use cropdrop_driver::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SIMULATOR_ADDR, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件路径：`<config_dir>/cropdrop/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("cannot determine config directory"))?;
    path.push("cropdrop");
    path.push("config.toml");
    Ok(path)
}

/// 显式路径优先，否则使用默认路径
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// 连接参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub address: String,
    pub connect_timeout_ms: u64,
    /// 连接后等待首帧遥测的上限
    pub first_telemetry_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SIMULATOR_ADDR.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            first_telemetry_timeout_ms: 2000,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn first_telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.first_telemetry_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub connection: ConnectionConfig,
    pub driver: PipelineConfig,
    pub controller: MissionConfig,
}

impl CliConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CliConfig = toml::from_str(text).context("invalid config file")?;
        config.validate()?;
        Ok(config)
    }

    /// 加载配置；文件不存在时返回默认值
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.address.trim().is_empty() {
            return Err(anyhow!("connection.address must not be empty"));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(anyhow!("connection.connect_timeout_ms must be > 0"));
        }
        if self.driver.ack_timeout_ms == 0 {
            return Err(anyhow!("driver.ack_timeout_ms must be > 0"));
        }
        self.controller.validate()?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// 写入文件（自动创建父目录）
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
