//! # CropDrop Control
//!
//! 循迹抓放任务控制器。
//!
//! - [`pid`]: 5 路循迹误差与 PID 修正
//! - [`node`]: 路口谓词与确认计数
//! - [`zone`]: 投放区颜色分类
//! - [`machine`]: 七状态任务状态机 [`MissionController`]
//! - [`loop_runner`]: 固定周期循环 [`run_mission`]
//! - [`config`]: TOML 配置 [`MissionConfig`]
//!
//! 控制层只依赖 `cropdrop_driver` 的 [`SensorSource`](cropdrop_driver::SensorSource) 与
//! [`Actuator`](cropdrop_driver::Actuator) 两个 trait，可以脱离真实连接测试。

pub mod config;
mod error;
pub mod intent;
pub mod loop_runner;
pub mod machine;
pub mod node;
pub mod pid;
pub mod zone;

pub use config::{MissionConfig, PidGains, SpeedConfig, ThresholdConfig, TimingConfig};
pub use error::ControlError;
pub use intent::RobotIntent;
pub use loop_runner::{LoopConfig, MissionExit, MissionSummary, run_mission};
pub use machine::{ControlState, MissionController, RetryTracker};
pub use node::{NodeDetector, is_node};
pub use pid::{LinePid, WheelSpeeds, line_error};
pub use zone::{ColorThresholds, TurnDirection, Zone, classify};
