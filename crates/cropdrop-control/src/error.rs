//! 控制层错误类型定义

use cropdrop_driver::DriverError;
use std::path::PathBuf;
use thiserror::Error;

/// 控制层错误类型
#[derive(Error, Debug)]
pub enum ControlError {
    /// 与仿真器的连接已丢失，任务终止
    #[error("Connection to simulator lost")]
    ConnectionLost,

    /// 配置文件 TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    /// 配置文件读取失败
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置值不合法
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// 驱动层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}
