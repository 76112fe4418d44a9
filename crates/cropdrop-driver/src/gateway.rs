//! 执行器网关
//!
//! 控制循环通过 [`Actuator`] 发出命令，真正的 socket 写入由 TX 线程完成：
//!
//! - `set_motors()`：写入电机邮箱后立即返回（最新值覆盖旧值）
//! - `pick()` / `drop_box()`：进入可靠队列，阻塞等待 TX 线程回报写入结果（有上限）
//!
//! 连接断开后所有调用立即返回 [`DriverError::Disconnected`]，不会写出任何字节。
//! 单次写失败只让该命令失败（[`DriverError::Rejected`]），会话继续；
//! 等待超时的命令被撤销，之后不会再出现在线上。

use crate::command::{MotorSlot, ReliableCommand};
use crate::error::DriverError;
use crate::metrics::DriverMetrics;
use crate::state::DriverContext;
use crossbeam_channel::{RecvTimeoutError, Sender, TrySendError};
use cropdrop_protocol::{ActuatorCommand, MotorCommand};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, warn};

/// 执行器命令接口
///
/// 成功仅表示命令已被传输层接受，不代表仿真器已执行。
pub trait Actuator {
    /// 设置左右轮速度
    fn set_motors(&self, left: f64, right: f64) -> Result<(), DriverError>;

    /// 触发抓取
    fn pick(&self) -> Result<(), DriverError>;

    /// 触发放下
    fn drop_box(&self) -> Result<(), DriverError>;

    /// 停车
    fn stop(&self) -> Result<(), DriverError> {
        self.set_motors(0.0, 0.0)
    }
}

/// TX 线程已认领命令时，等待其写入结果的上限
const CLAIMED_WRITE_WAIT: Duration = Duration::from_secs(1);

/// 基于 TX 线程的执行器实现
#[derive(Debug)]
pub struct ActuatorGateway {
    motor_slot: MotorSlot,
    reliable_tx: Sender<ReliableCommand>,
    ctx: Arc<DriverContext>,
    metrics: Arc<DriverMetrics>,
    ack_timeout: Duration,
}

impl ActuatorGateway {
    pub(crate) fn new(
        motor_slot: MotorSlot,
        reliable_tx: Sender<ReliableCommand>,
        ctx: Arc<DriverContext>,
        metrics: Arc<DriverMetrics>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            motor_slot,
            reliable_tx,
            ctx,
            metrics,
            ack_timeout,
        }
    }

    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.ctx.is_connected() {
            Ok(())
        } else {
            Err(DriverError::Disconnected)
        }
    }

    /// 入队一条可靠命令并等待写入确认
    fn send_reliable(&self, command: ActuatorCommand) -> Result<(), DriverError> {
        self.ensure_connected()?;

        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        let (reliable, ticket) = ReliableCommand::new(command, ack_tx);
        self.reliable_tx.try_send(reliable).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.metrics.tx_reliable_drops.fetch_add(1, Ordering::Relaxed);
                warn!("Reliable queue full, {} dropped", command);
                DriverError::ChannelFull
            },
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })?;

        let accepted = match ack_rx.recv_timeout(self.ack_timeout) {
            Ok(accepted) => accepted,
            Err(RecvTimeoutError::Timeout) => {
                if ticket.cancel() {
                    self.metrics
                        .tx_reliable_cancelled
                        .fetch_add(1, Ordering::Relaxed);
                    debug!("{} not written within {:?}, cancelled", command, self.ack_timeout);
                    return Err(DriverError::Timeout);
                }
                // TX 线程正在写，结果很快到达
                match ack_rx.recv_timeout(CLAIMED_WRITE_WAIT) {
                    Ok(accepted) => accepted,
                    Err(RecvTimeoutError::Timeout) => return Err(DriverError::Timeout),
                    Err(RecvTimeoutError::Disconnected) => return Err(DriverError::ChannelClosed),
                }
            },
            Err(RecvTimeoutError::Disconnected) => return Err(DriverError::ChannelClosed),
        };

        if accepted {
            debug!("{} accepted by transport", command);
            Ok(())
        } else if !self.ctx.is_connected() {
            Err(DriverError::Disconnected)
        } else {
            Err(DriverError::Rejected {
                command: command.to_string(),
            })
        }
    }
}

impl Actuator for ActuatorGateway {
    fn set_motors(&self, left: f64, right: f64) -> Result<(), DriverError> {
        self.ensure_connected()?;
        let command = MotorCommand::new(left, right)?;
        if self.motor_slot.lock().replace(command).is_some() {
            self.metrics.tx_motor_overwrites.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn pick(&self) -> Result<(), DriverError> {
        self.send_reliable(ActuatorCommand::Pick)
    }

    fn drop_box(&self) -> Result<(), DriverError> {
        self.send_reliable(ActuatorCommand::Drop)
    }
}
