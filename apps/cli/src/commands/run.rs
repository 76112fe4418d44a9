//! run 命令
//!
//! 连接仿真器，等待首帧遥测，然后运行任务直到 Ctrl+C 或连接断开。

use anyhow::{Context, Result, bail};
use clap::Args;
use cropdrop_control::{
    ControlError, LoopConfig, MissionController, MissionExit, MissionSummary, run_mission,
};
use tracing::{error, info};

use super::ConnectionArgs;
use crate::config::CliConfig;
use crate::connect::{connect, install_stop_flag};

#[derive(Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 控制周期（毫秒，覆盖配置文件）
    #[arg(long)]
    pub period_ms: Option<u64>,

    /// 运行指定周期数后退出
    #[arg(long)]
    pub max_cycles: Option<u64>,
}

impl RunCommand {
    /// 合并命令行覆盖后的配置
    fn effective_config(&self) -> Result<CliConfig> {
        let mut config = self.connection.load_config()?;
        if let Some(period_ms) = self.period_ms {
            config.controller.timing.period_ms = period_ms;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn execute(&self) -> Result<()> {
        let config = self.effective_config()?;
        let mut controller = MissionController::new(config.controller.clone())?;
        let mut loop_config = LoopConfig::from_mission(&config.controller);
        loop_config.max_cycles = self.max_cycles;

        let running = install_stop_flag()?;
        let robot = connect(&config.connection, &config.driver)?;

        robot
            .wait_for_telemetry(config.connection.first_telemetry_timeout())
            .context("no telemetry received from simulator")?;
        info!("Telemetry flowing, starting mission");
        println!("Mission running, press Ctrl+C to stop\n");

        let result = run_mission(&robot, &robot, &mut controller, &loop_config, &running);
        let metrics = robot.get_metrics();

        match result {
            Ok(summary) => {
                print_summary(&summary);
                println!("Driver: {}", metrics);
                Ok(())
            },
            Err(ControlError::ConnectionLost) => {
                error!(
                    "Connection to simulator lost in state {} ({} deliveries)",
                    controller.state(),
                    controller.deliveries()
                );
                println!("Driver: {}", metrics);
                bail!("connection to simulator lost");
            },
            Err(e) => Err(e.into()),
        }
    }
}

fn print_summary(summary: &MissionSummary) {
    let reason = match summary.exit {
        MissionExit::Stopped => "stopped",
        MissionExit::CycleLimit => "cycle limit reached",
    };
    println!("Mission {}:", reason);
    println!("  cycles:      {}", summary.cycles);
    println!("  steps:       {}", summary.steps);
    println!("  stale:       {}", summary.stale_cycles);
    println!("  overruns:    {}", summary.overruns);
    println!("  transitions: {}", summary.transitions);
    println!("  deliveries:  {}", summary.deliveries);
    println!("  final state: {}", summary.final_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_period_override_applies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[controller.timing]\nperiod_ms = 40").unwrap();

        let cmd = RunCommand {
            connection: ConnectionArgs {
                addr: Some("127.0.0.1:1".to_string()),
                config: Some(file.path().to_path_buf()),
            },
            period_ms: Some(15),
            max_cycles: None,
        };
        let config = cmd.effective_config().unwrap();
        assert_eq!(config.controller.timing.period_ms, 15);
        assert_eq!(config.connection.address, "127.0.0.1:1");
    }

    #[test]
    fn test_zero_period_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = RunCommand {
            connection: ConnectionArgs {
                addr: None,
                config: Some(dir.path().join("absent.toml")),
            },
            period_ms: Some(0),
            max_cycles: None,
        };
        assert!(cmd.effective_config().is_err());
    }
}
