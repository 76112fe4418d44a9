//! 驱动层错误类型定义

use cropdrop_protocol::ProtocolError;
use cropdrop_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误（连接、读写）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 命令编码错误（如非有限速度值）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 连接已断开，不再接受任何执行器命令
    #[error("Simulator connection lost")]
    Disconnected,

    /// 命令通道已关闭（TX 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 可靠命令队列已满（容量 10）
    #[error("Command channel full (buffer size: 10)")]
    ChannelFull,

    /// 写入未被传输层接受
    #[error("Command {command} was not accepted by the transport")]
    Rejected { command: String },

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否意味着连接已不可用
    pub fn is_connection_loss(&self) -> bool {
        match self {
            DriverError::Disconnected | DriverError::ChannelClosed => true,
            DriverError::Transport(e) => e.is_fatal(),
            _ => false,
        }
    }
}
