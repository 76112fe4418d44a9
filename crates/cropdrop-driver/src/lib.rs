//! # CropDrop Driver
//!
//! 仿真器会话层：IO 线程管理、遥测快照同步、执行器命令下发。
//!
//! ## 线程模型
//!
//! - RX 线程（`rx_loop`）：解码遥测并整体发布 [`SensorSnapshot`]（`ArcSwap`，无锁读）
//! - TX 线程（`tx_loop_mailbox`）：电机邮箱 + PICK/DROP 可靠队列
//! - 控制循环在调用方线程，通过 [`SensorSource`] / [`Actuator`] 两个 trait 访问会话
//!
//! 连接一旦丢失（对端关闭或 IO 错误）即标记 `connected = false`，不重连。

pub mod builder;
pub mod command;
mod error;
pub mod gateway;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
mod robot;
pub mod state;

pub use builder::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SIMULATOR_ADDR, RobotBuilder};
pub use error::DriverError;
pub use gateway::{Actuator, ActuatorGateway};
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use pipeline::PipelineConfig;
pub use robot::Robot;
pub use state::{DriverContext, Rgb, SensorSnapshot, SensorSource};
