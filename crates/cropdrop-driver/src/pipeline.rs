//! IO 线程主循环
//!
//! - `rx_loop`: 遥测解码任务。读 socket → 分帧/解析 → 每条记录整体发布一次快照
//! - `tx_loop_mailbox`: 执行器写出任务。电机邮箱优先，其次可靠队列
//!
//! 两个循环都在每轮开头检查 `is_running`。只有 RX 侧的致命错误（对端关闭、读失败）
//! 会把连接标记为断开并让两个线程一起退出（不重连）；TX 写失败只让当前命令失败。

use crate::command::{MotorSlot, ReliableCommand};
use crate::heartbeat::monotonic_micros;
use crate::metrics::DriverMetrics;
use crate::state::DriverContext;
use crossbeam_channel::{Receiver, TryRecvError};
use cropdrop_protocol::{ActuatorCommand, DEFAULT_MAX_LINE_LEN, TelemetryDecoder};
use cropdrop_transport::{RxTransport, TransportError, TxTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use cropdrop_driver::PipelineConfig;
///
/// let config = PipelineConfig {
///     receive_timeout_ms: 10,
///     ..Default::default()
/// };
/// assert_eq!(config.max_line_len, 2048);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PipelineConfig {
    /// socket 读超时（毫秒），决定 RX 线程检查运行标志的间隔
    pub receive_timeout_ms: u64,
    /// 单次读取缓冲区大小
    pub read_buffer_size: usize,
    /// 单行最大长度，超出的行整行丢弃
    pub max_line_len: usize,
    /// TX 线程空闲休眠（微秒）
    pub tx_idle_sleep_us: u64,
    /// PICK/DROP 等待写入确认的上限（毫秒）
    pub ack_timeout_ms: u64,
    /// 遥测静默多久视为过期（毫秒）
    pub feedback_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 5,
            read_buffer_size: 2048,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            tx_idle_sleep_us: 200,
            ack_timeout_ms: 100,
            feedback_timeout_ms: 500,
        }
    }
}

impl PipelineConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn feedback_timeout(&self) -> Duration {
        Duration::from_millis(self.feedback_timeout_ms)
    }
}

/// 遥测解码循环（RX 线程）
///
/// 独占接收缓冲区、分帧器和工作快照；是已发布快照的唯一写者。
///
/// # 退出条件
/// - `is_running` 被清除（最多延迟一个读超时）
/// - 对端关闭或 IO 错误：标记断开，清除 `is_running` 以联动 TX 线程退出
pub fn rx_loop(
    mut rx: impl RxTransport,
    ctx: Arc<DriverContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<DriverMetrics>,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("RX thread priority set to MAX (realtime)"),
            Err(e) => warn!(
                "Failed to set RX thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                e
            ),
        }
    }

    rx.set_receive_timeout(config.receive_timeout());

    let mut decoder = TelemetryDecoder::with_max_line_len(config.max_line_len);
    let mut working = ctx.load().as_ref().clone();
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let n = match rx.receive(&mut buf) {
            Ok(n) => n,
            Err(TransportError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(TransportError::Closed) => {
                info!("RX thread: simulator closed the connection");
                ctx.mark_disconnected();
                is_running.store(false, Ordering::Release);
                break;
            },
            Err(e) => {
                error!("RX thread: receive failed: {}", e);
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                if e.is_fatal() {
                    ctx.mark_disconnected();
                    is_running.store(false, Ordering::Release);
                    break;
                }
                continue;
            },
        };

        metrics.rx_bytes_total.fetch_add(n as u64, Ordering::Relaxed);

        for record in decoder.feed(&buf[..n]) {
            working.apply(&record);
            working.sequence += 1;
            working.system_timestamp_us = monotonic_micros();
            ctx.publish(working.clone());

            metrics.rx_records_total.fetch_add(1, Ordering::Relaxed);
            if record.malformed_values() > 0 {
                metrics
                    .rx_malformed_values
                    .fetch_add(u64::from(record.malformed_values()), Ordering::Relaxed);
                debug!(
                    "RX thread: record #{} had {} malformed values (defaulted to 0.0)",
                    working.sequence,
                    record.malformed_values()
                );
            }
            if record.unknown_fields() > 0 {
                metrics
                    .rx_unknown_fields
                    .fetch_add(u64::from(record.unknown_fields()), Ordering::Relaxed);
            }
            trace!(
                "RX thread: record #{} S={:?} P={:?} C={:?}",
                working.sequence, working.line_sensors, working.proximity_m, working.color
            );
        }

        metrics
            .rx_lines_empty
            .store(decoder.empty_lines(), Ordering::Relaxed);
        let oversized = decoder.oversized_lines();
        if metrics.rx_lines_oversized.swap(oversized, Ordering::Relaxed) != oversized {
            warn!(
                "RX thread: discarded line longer than {} bytes",
                config.max_line_len
            );
        }
    }

    trace!("RX thread: loop exited");
}

/// 执行器写出循环（TX 线程，邮箱模式）
///
/// 优先级：电机邮箱 > 可靠队列。可靠命令先认领再写出并回报确认，已被调用方撤销的直接跳过。
/// 写失败只回报给当前命令，循环继续。
/// 正常停机时会把邮箱里最后一条电机命令写出（通常是停车），连接断开后不再写任何东西。
pub fn tx_loop_mailbox(
    mut tx: impl TxTransport,
    motor_slot: MotorSlot,
    reliable_rx: Receiver<ReliableCommand>,
    ctx: Arc<DriverContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<DriverMetrics>,
) {
    let idle = Duration::from_micros(config.tx_idle_sleep_us);

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            if ctx.is_connected() {
                flush_motor_slot(&mut tx, &motor_slot, &metrics);
            }
            break;
        }

        let motor = motor_slot.lock().take();
        if let Some(motor) = motor {
            let command = ActuatorCommand::SetMotors(motor);
            write_command(&mut tx, &command, &ctx, &metrics);
            continue;
        }

        match reliable_rx.try_recv() {
            Ok(reliable) => {
                if !reliable.claim() {
                    trace!("TX thread: {} cancelled by caller, skipped", reliable.command);
                    continue;
                }
                let accepted = write_command(&mut tx, &reliable.command, &ctx, &metrics);
                reliable.complete(accepted);
            },
            Err(TryRecvError::Empty) => spin_sleep::sleep(idle),
            Err(TryRecvError::Disconnected) => {
                trace!("TX thread: reliable channel closed, exiting");
                break;
            },
        }
    }

    // 队列中残留的可靠命令一律回报失败，避免调用方等到超时
    while let Ok(reliable) = reliable_rx.try_recv() {
        reliable.complete(false);
    }

    trace!("TX thread: loop exited");
}

/// 写出一条命令；返回 `false` 表示未写出（连接已断开或本次写失败）
///
/// 写失败不改变连接状态，断开只由 RX 线程判定。
fn write_command(
    tx: &mut impl TxTransport,
    command: &ActuatorCommand,
    ctx: &DriverContext,
    metrics: &DriverMetrics,
) -> bool {
    // RX 线程可能已观察到断开；此后一个字节都不能再写
    if !ctx.is_connected() {
        return false;
    }

    match tx.send(&command.to_bytes()) {
        Ok(()) => {
            metrics.tx_commands_total.fetch_add(1, Ordering::Relaxed);
            trace!("TX thread: sent {}", command);
            true
        },
        Err(e) => {
            warn!("TX thread: failed to send {}: {}", command, e);
            metrics.tx_rejected.fetch_add(1, Ordering::Relaxed);
            false
        },
    }
}

fn flush_motor_slot(tx: &mut impl TxTransport, motor_slot: &MotorSlot, metrics: &DriverMetrics) {
    let pending = motor_slot.lock().take();
    if let Some(motor) = pending {
        let command = ActuatorCommand::SetMotors(motor);
        match tx.send(&command.to_bytes()) {
            Ok(()) => {
                metrics.tx_commands_total.fetch_add(1, Ordering::Relaxed);
                debug!("TX thread: flushed final {}", command);
            },
            Err(e) => warn!("TX thread: failed to flush final {}: {}", command, e),
        }
    }
}
