//! # CropDrop Transport Layer
//!
//! 字节流传输抽象层，提供统一的收发接口。
//!
//! - `tcp`: 连接仿真器的 TCP 实现（默认后端）
//! - `mock`: 脚本化的内存实现（`mock` feature 或测试时可用）
//!
//! # 接收语义
//!
//! `receive()` 要么返回 `Ok(n)`（`n > 0`），要么返回错误：
//! - `TransportError::Timeout`: 超时窗口内无数据（正常情况，调用方应检查运行标志后重试）
//! - `TransportError::Closed`: 对端有序关闭
//! - 其它：IO 错误

use std::time::Duration;
use thiserror::Error;

pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tcp::{TcpRxTransport, TcpTransport, TcpTxTransport};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockRxTransport, MockTransport, MockTxTransport};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Closed,
}

impl TransportError {
    /// 是否为致命错误（连接不可恢复）
    ///
    /// `Timeout` 是唯一的非致命错误。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Timeout)
    }
}

pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.set_receive_timeout(timeout);
        self.receive(buf)
    }
}

pub trait RxTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
}

pub trait TxTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

pub trait SplittableTransport: Transport {
    type Rx: RxTransport;
    type Tx: TxTransport;
    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let e = TransportError::Connect {
            addr: "127.0.0.1:50002".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        let msg = format!("{}", e);
        assert!(msg.contains("127.0.0.1:50002") && msg.contains("refused"));

        assert_eq!(format!("{}", TransportError::Timeout), "Read timeout");
        assert_eq!(
            format!("{}", TransportError::Closed),
            "Connection closed by peer"
        );
    }

    #[test]
    fn test_only_timeout_is_recoverable() {
        assert!(!TransportError::Timeout.is_fatal());
        assert!(TransportError::Closed.is_fatal());
        assert!(
            TransportError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"))
                .is_fatal()
        );
    }
}
