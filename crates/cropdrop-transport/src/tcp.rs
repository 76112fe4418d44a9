//! TCP 传输实现
//!
//! 连接仿真器的唯一一条 TCP 流。分离时基于 `TcpStream::try_clone()`，
//! RX/TX 两半共享同一个打开的 socket。
//!
//! # 注意
//!
//! `try_clone()` 复制的是文件描述符，非阻塞标志在两半之间共享。
//! 因此严禁在分离后调用 `set_nonblocking()`，超时一律使用 `SO_RCVTIMEO`（`set_read_timeout`）。

use crate::{RxTransport, SplittableTransport, Transport, TransportError, TxTransport};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 默认读超时（RX 线程据此周期性检查运行标志）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// `set_read_timeout(Some(ZERO))` 在 std 中是错误，统一钳位到 1ms
fn effective_timeout(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

/// 把读结果映射为传输层语义：`Ok(0)` 即对端关闭
fn map_read(result: std::io::Result<usize>) -> Result<usize, TransportError> {
    match result {
        Ok(0) => Err(TransportError::Closed),
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                Err(TransportError::Timeout)
            },
            ErrorKind::UnexpectedEof => Err(TransportError::Closed),
            _ => Err(TransportError::Io(e)),
        },
    }
}

fn write_all(stream: &mut TcpStream, bytes: &[u8]) -> Result<(), TransportError> {
    stream.write_all(bytes)?;
    trace!("TCP sent {} bytes", bytes.len());
    Ok(())
}

/// TCP 传输（未分离）
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// 连接到仿真器
    ///
    /// 依次尝试地址解析出的每个 `SocketAddr`，全部失败时返回最后一个错误。
    ///
    /// # 错误
    /// - `TransportError::Connect`: 解析或连接失败（调用方应视为启动期致命错误）
    pub fn connect(addr: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?
            .collect();

        let mut last_error =
            std::io::Error::new(ErrorKind::NotFound, "address resolved to no candidates");

        for candidate in candidates {
            debug!("Connecting to {} (timeout {:?})", candidate, connect_timeout);
            match TcpStream::connect_timeout(&candidate, connect_timeout) {
                Ok(stream) => {
                    return Self::from_stream(stream).map_err(|e| match e {
                        TransportError::Io(source) => TransportError::Connect {
                            addr: addr.to_string(),
                            source,
                        },
                        other => other,
                    });
                },
                Err(e) => {
                    warn!("Connection to {} failed: {}", candidate, e);
                    last_error = e;
                },
            }
        }

        Err(TransportError::Connect {
            addr: addr.to_string(),
            source: last_error,
        })
    }

    /// 包装已建立的连接
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }

    /// 对端地址
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_all(&mut self.stream, bytes)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        map_read(self.stream.read(buf))
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.stream.set_read_timeout(Some(effective_timeout(timeout))) {
            warn!("Failed to set TCP read timeout: {}", e);
        }
    }
}

impl SplittableTransport for TcpTransport {
    type Rx = TcpRxTransport;
    type Tx = TcpTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        let rx_stream = self.stream.try_clone()?;
        Ok((
            TcpRxTransport {
                stream: rx_stream,
                peer: self.peer,
            },
            TcpTxTransport {
                stream: self.stream,
                peer: self.peer,
            },
        ))
    }
}

/// 只读半边（RX 线程独占）
#[derive(Debug)]
pub struct TcpRxTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpRxTransport {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl RxTransport for TcpRxTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        map_read(self.stream.read(buf))
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.stream.set_read_timeout(Some(effective_timeout(timeout))) {
            warn!("Failed to set TCP read timeout: {}", e);
        }
    }
}

/// 只写半边（TX 线程独占）
#[derive(Debug)]
pub struct TcpTxTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTxTransport {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl TxTransport for TcpTxTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_all(&mut self.stream, bytes)
    }
}
