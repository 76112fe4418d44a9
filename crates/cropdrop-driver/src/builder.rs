//! Builder 模式实现
//!
//! 提供链式构造 `Robot` 实例的便捷方式。

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::robot::Robot;
use cropdrop_transport::TcpTransport;
use std::time::Duration;
use tracing::info;

/// 仿真器默认监听地址
pub const DEFAULT_SIMULATOR_ADDR: &str = "127.0.0.1:50002";

/// 默认连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Robot Builder
///
/// # Example
///
/// ```no_run
/// use cropdrop_driver::{PipelineConfig, RobotBuilder};
/// use std::time::Duration;
///
/// let robot = RobotBuilder::new()
///     .address("127.0.0.1:50002")
///     .connect_timeout(Duration::from_secs(1))
///     .pipeline_config(PipelineConfig::default())
///     .build()
///     .expect("simulator not reachable");
/// ```
#[derive(Debug, Clone)]
pub struct RobotBuilder {
    address: Option<String>,
    connect_timeout: Duration,
    pipeline_config: Option<PipelineConfig>,
}

impl RobotBuilder {
    pub fn new() -> Self {
        Self {
            address: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pipeline_config: None,
        }
    }

    /// 仿真器地址（`host:port`），默认 `127.0.0.1:50002`
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 建立连接并启动 IO 线程
    ///
    /// 只尝试一次，不重连。
    ///
    /// # 错误
    /// - `DriverError::Transport(TransportError::Connect { .. })`: 仿真器不可达
    pub fn build(self) -> Result<Robot, DriverError> {
        let address = self
            .address
            .unwrap_or_else(|| DEFAULT_SIMULATOR_ADDR.to_string());
        let transport = TcpTransport::connect(&address, self.connect_timeout)?;
        info!("Connected to simulator at {}", transport.peer_addr());
        Ok(Robot::new(transport, self.pipeline_config)?.with_peer(address))
    }
}

impl Default for RobotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
