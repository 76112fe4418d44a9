//! # CropDrop CLI
//!
//! 连接仿真器并运行抓放任务。
//!
//! ```bash
//! # 生成默认配置
//! cropdrop config init
//!
//! # 运行任务（Ctrl+C 停止）
//! cropdrop run --addr 127.0.0.1:50002
//!
//! # 只看遥测
//! cropdrop monitor --frequency 5
//! ```
//!
//! 日志级别通过 `RUST_LOG` 调整，默认 `cropdrop_cli=info,cropdrop_control=info`。

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod connect;

use commands::{ConfigCommand, MonitorCommand, RunCommand};

const DEFAULT_LOG_FILTER: &str = "cropdrop_cli=info,cropdrop_control=info";

/// CropDrop - 循迹抓放机器人控制器
#[derive(Parser, Debug)]
#[command(name = "cropdrop")]
#[command(about = "Line-following pick-and-place controller for the CropDrop simulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行抓放任务
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 监控遥测与驱动统计
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::Monitor { args } => args.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "cropdrop",
            "run",
            "--addr",
            "10.0.0.2:50002",
            "--period-ms",
            "10",
            "--max-cycles",
            "500",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { args } => {
                assert_eq!(args.connection.addr.as_deref(), Some("10.0.0.2:50002"));
                assert_eq!(args.period_ms, Some(10));
                assert_eq!(args.max_cycles, Some(500));
            },
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_subcommands() {
        let cli = Cli::try_parse_from(["cropdrop", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommand::Init { force: true, .. })
        ));

        let cli = Cli::try_parse_from(["cropdrop", "config", "check", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Check { .. })));
    }

    #[test]
    fn test_monitor_default_frequency() {
        let cli = Cli::try_parse_from(["cropdrop", "monitor"]).unwrap();
        match cli.command {
            Commands::Monitor { args } => assert_eq!(args.frequency, 5),
            other => panic!("expected monitor, got {:?}", other),
        }
    }

    #[test]
    fn test_default_log_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
