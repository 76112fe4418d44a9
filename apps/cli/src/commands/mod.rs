//! 命令定义和实现

pub mod config;
pub mod monitor;
pub mod run;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
pub use run::RunCommand;

use clap::Args;
use std::path::PathBuf;

/// 各命令共用的连接参数
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 仿真器地址（覆盖配置文件）
    #[arg(short, long)]
    pub addr: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// 加载配置文件并应用命令行覆盖
    pub fn load_config(&self) -> anyhow::Result<crate::config::CliConfig> {
        let path = crate::config::resolve_path(self.config.as_deref())?;
        let mut config = crate::config::CliConfig::load(&path)?;
        if let Some(addr) = &self.addr {
            config.connection.address = addr.clone();
        }
        Ok(config)
    }
}
