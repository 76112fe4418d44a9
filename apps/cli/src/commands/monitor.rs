//! monitor 命令
//!
//! 只读：周期性打印最新遥测快照与驱动统计，不发送任何命令。

use anyhow::{Result, bail};
use clap::Args;
use cropdrop_control::{classify, line_error};
use cropdrop_driver::{MetricsSnapshot, SensorSnapshot};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ConnectionArgs;
use crate::connect::{connect, install_stop_flag};

#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 刷新频率（Hz）
    #[arg(short, long, default_value_t = 5)]
    pub frequency: u32,
}

impl MonitorCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connection.load_config()?;
        let running = install_stop_flag()?;
        let robot = connect(&config.connection, &config.driver)?;

        println!("Monitoring at {} Hz, press Ctrl+C to stop\n", self.frequency);
        let interval = Duration::from_secs_f64(1.0 / self.frequency.max(1) as f64);

        while running.load(Ordering::SeqCst) {
            if !robot.is_connected() {
                bail!("connection to simulator lost");
            }
            let snapshot = robot.get_snapshot();
            print_snapshot(
                &snapshot,
                robot.is_telemetry_fresh(),
                &config.controller.thresholds.color,
            );
            print_metrics(&robot.get_metrics());
            std::thread::sleep(interval);
        }

        println!("Monitor stopped");
        Ok(())
    }
}

fn print_snapshot(
    snapshot: &SensorSnapshot,
    fresh: bool,
    thresholds: &cropdrop_control::ColorThresholds,
) {
    println!("========================================");
    if !snapshot.has_telemetry() {
        println!("(waiting for telemetry)");
        return;
    }
    println!(
        "seq {}  age {:?}{}",
        snapshot.sequence,
        snapshot.age(),
        if fresh { "" } else { "  [STALE]" }
    );
    let sensors: Vec<String> = snapshot
        .line_sensors
        .iter()
        .map(|v| format!("{:.2}", v))
        .collect();
    println!(
        "line:  [{}]  error {:+.3}",
        sensors.join(", "),
        line_error(&snapshot.line_sensors)
    );
    match snapshot.proximity_m {
        Some(d) => println!("prox:  {:.3} m", d),
        None => println!("prox:  -"),
    }
    let c = snapshot.color;
    let zone = classify(c, thresholds)
        .map(|z| z.to_string())
        .unwrap_or_else(|| "unclassified".to_string());
    println!("color: ({:.2}, {:.2}, {:.2})  {}", c.r, c.g, c.b, zone);
}

fn print_metrics(metrics: &MetricsSnapshot) {
    println!("driver: {}", metrics);
}
