//! Loop Runner - 固定周期任务循环
//!
//! 每个周期：
//! 1. 检查停止标志与周期上限
//! 2. 检查连接；已断开则立即返回 `ConnectionLost`，不再发送任何命令
//! 3. 读取一次快照；`sequence` 未变化则跳过（不重复处理同一帧），
//!    遥测静默超过 `telemetry_timeout` 时停车一次
//! 4. 调用 [`MissionController::step`]
//! 5. 用 `spin_sleep` 休眠到下一个周期起点（固定频率，超时不补偿）

use crate::config::MissionConfig;
use crate::error::ControlError;
use crate::machine::{ControlState, MissionController};
use cropdrop_driver::{Actuator, SensorSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 循环配置
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// 控制周期
    pub period: Duration,
    /// 运行周期上限，`None` 为直到停止
    pub max_cycles: Option<u64>,
    /// 遥测静默多久后停车
    pub telemetry_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_mission(&MissionConfig::default())
    }
}

impl LoopConfig {
    pub fn from_mission(config: &MissionConfig) -> Self {
        Self {
            period: config.timing.period(),
            max_cycles: None,
            telemetry_timeout: config.timing.telemetry_timeout(),
        }
    }
}

/// 循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionExit {
    /// 停止标志被清除（如 Ctrl-C）
    Stopped,
    /// 达到 `max_cycles`
    CycleLimit,
}

/// 运行统计
#[derive(Debug, Clone, PartialEq)]
pub struct MissionSummary {
    pub exit: MissionExit,
    pub cycles: u64,
    /// 实际处理的新遥测帧数
    pub steps: u64,
    /// 因遥测未更新而跳过的周期数
    pub stale_cycles: u64,
    /// 执行超出周期的次数
    pub overruns: u64,
    pub deliveries: u64,
    pub transitions: u64,
    pub final_state: ControlState,
}

/// 运行任务直到停止、达到周期上限或连接丢失
///
/// # 错误
/// - `ControlError::InvalidConfig`: 周期为 0
/// - `ControlError::ConnectionLost`: 连接断开（返回前不再发送任何命令）
pub fn run_mission<S, A>(
    source: &S,
    actuator: &A,
    controller: &mut MissionController,
    config: &LoopConfig,
    running: &AtomicBool,
) -> Result<MissionSummary, ControlError>
where
    S: SensorSource + ?Sized,
    A: Actuator + ?Sized,
{
    if config.period.is_zero() {
        return Err(ControlError::InvalidConfig(
            "loop period must be > 0".to_string(),
        ));
    }

    let mut summary = MissionSummary {
        exit: MissionExit::Stopped,
        cycles: 0,
        steps: 0,
        stale_cycles: 0,
        overruns: 0,
        deliveries: 0,
        transitions: 0,
        final_state: controller.state(),
    };
    let mut last_sequence = 0;
    let mut halted_for_stale = false;
    let mut next_tick = Instant::now();

    info!(
        "Mission loop started (period {:?}, max cycles {:?})",
        config.period, config.max_cycles
    );

    let exit = loop {
        if !running.load(Ordering::Acquire) {
            break MissionExit::Stopped;
        }
        if config.max_cycles.is_some_and(|max| summary.cycles >= max) {
            break MissionExit::CycleLimit;
        }
        if !source.is_connected() {
            error!(
                "Connection lost in state {} after {} cycles",
                controller.state(),
                summary.cycles
            );
            return Err(ControlError::ConnectionLost);
        }

        let snapshot = source.snapshot();
        if snapshot.sequence == last_sequence {
            summary.stale_cycles += 1;
            if snapshot.has_telemetry()
                && !halted_for_stale
                && snapshot.age() > config.telemetry_timeout
            {
                warn!(
                    "No telemetry for {:?}, stopping motors",
                    snapshot.age()
                );
                halted_for_stale = true;
                if let Err(e) = actuator.stop() {
                    if e.is_connection_loss() {
                        return Err(ControlError::ConnectionLost);
                    }
                    debug!("Stop command rejected: {}", e);
                }
            }
        } else {
            if halted_for_stale {
                info!("Telemetry resumed");
                halted_for_stale = false;
            }
            last_sequence = snapshot.sequence;
            controller.step(&snapshot, actuator)?;
            summary.steps += 1;
        }

        summary.cycles += 1;

        next_tick += config.period;
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            summary.overruns += 1;
            debug!("Control cycle overran by {:?}", now - next_tick);
            next_tick = now;
        }
    };

    if source.is_connected()
        && let Err(e) = actuator.stop()
    {
        warn!("Failed to stop motors on exit: {}", e);
    }

    summary.exit = exit;
    summary.deliveries = controller.deliveries();
    summary.transitions = controller.transitions();
    summary.final_state = controller.state();
    info!(
        "Mission loop finished ({:?}): {} cycles, {} deliveries",
        exit, summary.cycles, summary.deliveries
    );
    Ok(summary)
}
