//! 连接仿真器

use crate::config::ConnectionConfig;
use anyhow::{Context, Result};
use cropdrop_driver::{PipelineConfig, Robot, RobotBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 连接失败时提示的检查项
pub const READINESS_CHECKLIST: &str = "\
Make sure that:
  1. CoppeliaSim is running
  2. The simulation scene is loaded
  3. The remote API is enabled on port 50002";

/// 建立连接；失败时打印检查清单
pub fn connect(connection: &ConnectionConfig, pipeline: &PipelineConfig) -> Result<Robot> {
    println!("Connecting to simulator at {} ...", connection.address);

    let result = RobotBuilder::new()
        .address(connection.address.clone())
        .connect_timeout(connection.connect_timeout())
        .pipeline_config(pipeline.clone())
        .build();

    match result {
        Ok(robot) => {
            println!("Connected to {}", robot.peer());
            Ok(robot)
        },
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", connection.address, e);
            eprintln!("{}", READINESS_CHECKLIST);
            Err(e).context("connection failed")
        },
    }
}

/// 安装 Ctrl+C 处理，返回运行标志
pub fn install_stop_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        eprintln!("\nStop requested, shutting down...");
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_failure_is_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let connection = ConnectionConfig {
            address: addr,
            connect_timeout_ms: 200,
            ..Default::default()
        };
        let err = connect(&connection, &PipelineConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("connection failed"));
    }

    #[test]
    fn test_connect_success() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let connection = ConnectionConfig {
            address: listener.local_addr().unwrap().to_string(),
            connect_timeout_ms: 1000,
            ..Default::default()
        };
        let robot = connect(&connection, &PipelineConfig::default()).unwrap();
        assert!(robot.is_connected());
    }

    #[test]
    fn test_checklist_mentions_port() {
        assert!(READINESS_CHECKLIST.contains("50002"));
    }
}
