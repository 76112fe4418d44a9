//! TX 线程的命令载体
//!
//! - 电机速度走邮箱（[`MotorSlot`]），只保留最新值
//! - `PICK` / `DROP` 走有界可靠队列，附带一次性确认通道
//!
//! 可靠命令与调用方共享一个认领标志：TX 线程写出前必须先认领，调用方超时时抢先认领即为撤销。
//! 两者只有一方能成功，因此超时返回的命令不会在之后被写出。

use crossbeam_channel::Sender;
use cropdrop_protocol::{ActuatorCommand, MotorCommand};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 电机命令邮箱（最新值覆盖旧值）
pub type MotorSlot = Arc<Mutex<Option<MotorCommand>>>;

/// 可靠队列容量
pub const RELIABLE_QUEUE_CAPACITY: usize = 10;

/// 可靠命令（带写入确认）
#[derive(Debug)]
pub struct ReliableCommand {
    pub command: ActuatorCommand,
    /// 写入结果：`true` 表示传输层已接受
    ack: Sender<bool>,
    claimed: Arc<AtomicBool>,
}

/// 调用方持有的撤销句柄
#[derive(Debug)]
pub struct ReliableTicket {
    claimed: Arc<AtomicBool>,
}

impl ReliableCommand {
    pub fn new(command: ActuatorCommand, ack: Sender<bool>) -> (Self, ReliableTicket) {
        let claimed = Arc::new(AtomicBool::new(false));
        let ticket = ReliableTicket {
            claimed: claimed.clone(),
        };
        (
            Self {
                command,
                ack,
                claimed,
            },
            ticket,
        )
    }

    /// TX 线程写出前认领；返回 `false` 表示调用方已撤销
    pub fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 回报写入结果（调用方可能已离开，忽略发送失败）
    pub fn complete(self, accepted: bool) {
        let _ = self.ack.try_send(accepted);
    }
}

impl ReliableTicket {
    /// 撤销尚未被 TX 线程认领的命令
    ///
    /// 返回 `false` 表示 TX 线程已认领，写入结果随后会通过确认通道到达。
    pub fn cancel(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
