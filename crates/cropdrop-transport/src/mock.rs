//! 脚本化 Mock 传输
//!
//! 用于在没有仿真器的情况下驱动 RX/TX 线程：
//! - 测试通过 `MockHandle` 注入入站字节块、关闭或 IO 错误
//! - 所有出站写入被记录，可按行取回
//!
//! 入站字节块按注入时的边界逐次返回（超出调用方缓冲区的部分留到下次），
//! 因此可以精确复现"半行"、"多行一包"等分帧场景。

use crate::{RxTransport, SplittableTransport, Transport, TransportError, TxTransport};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 入站事件
#[derive(Debug)]
enum MockEvent {
    Data(Vec<u8>),
    Close,
    Error(ErrorKind),
}

/// 测试侧句柄
#[derive(Debug, Clone)]
pub struct MockHandle {
    inbound: Sender<MockEvent>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_sends: Arc<AtomicBool>,
}

impl MockHandle {
    /// 注入一块入站字节
    pub fn push(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(MockEvent::Data(bytes.into()));
    }

    /// 模拟对端有序关闭
    pub fn close(&self) {
        let _ = self.inbound.send(MockEvent::Close);
    }

    /// 模拟 IO 错误
    pub fn fail_read(&self, kind: ErrorKind) {
        let _ = self.inbound.send(MockEvent::Error(kind));
    }

    /// 之后的写入全部失败（`BrokenPipe`）
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Release);
    }

    /// 每次 `send()` 调用写入的原始字节
    pub fn sent_chunks(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// 所有已写出的完整行（不含 `\n`）
    pub fn sent_lines(&self) -> Vec<String> {
        let all: Vec<u8> = self.sent.lock().concat();
        String::from_utf8_lossy(&all)
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }

    /// 清空出站记录
    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }
}

/// 入站半边的共享实现
#[derive(Debug)]
struct Inbound {
    events: Receiver<MockEvent>,
    pending: VecDeque<u8>,
    timeout: Duration,
}

impl Inbound {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.pending.is_empty() {
            match self.events.recv_timeout(self.timeout) {
                Ok(MockEvent::Data(bytes)) => self.pending.extend(bytes),
                Ok(MockEvent::Close) => return Err(TransportError::Closed),
                Ok(MockEvent::Error(kind)) => {
                    return Err(TransportError::Io(std::io::Error::from(kind)));
                },
                Err(RecvTimeoutError::Timeout) => return Err(TransportError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            }
            // 空数据块：与真实 socket 的"无数据"一致，按超时处理
            if self.pending.is_empty() {
                return Err(TransportError::Timeout);
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// 出站半边的共享实现
#[derive(Debug, Clone)]
struct Outbound {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_sends: Arc<AtomicBool>,
}

impl Outbound {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(TransportError::Io(std::io::Error::from(
                ErrorKind::BrokenPipe,
            )));
        }
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }
}

/// Mock 传输（未分离）
#[derive(Debug)]
pub struct MockTransport {
    inbound: Inbound,
    outbound: Outbound,
}

impl MockTransport {
    /// 创建传输与测试句柄
    pub fn pair() -> (MockTransport, MockHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let fail_sends = Arc::new(AtomicBool::new(false));

        let transport = MockTransport {
            inbound: Inbound {
                events: rx,
                pending: VecDeque::new(),
                timeout: Duration::from_millis(5),
            },
            outbound: Outbound {
                sent: sent.clone(),
                fail_sends: fail_sends.clone(),
            },
        };
        let handle = MockHandle {
            inbound: tx,
            sent,
            fail_sends,
        };
        (transport, handle)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outbound.send(bytes)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.inbound.receive(buf)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.inbound.timeout = timeout;
    }
}

impl SplittableTransport for MockTransport {
    type Rx = MockRxTransport;
    type Tx = MockTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        Ok((
            MockRxTransport {
                inbound: self.inbound,
            },
            MockTxTransport {
                outbound: self.outbound,
            },
        ))
    }
}

#[derive(Debug)]
pub struct MockRxTransport {
    inbound: Inbound,
}

impl RxTransport for MockRxTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.inbound.receive(buf)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.inbound.timeout = timeout;
    }
}

#[derive(Debug)]
pub struct MockTxTransport {
    outbound: Outbound,
}

impl TxTransport for MockTxTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outbound.send(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_preserves_chunk_boundaries() {
        let (mut transport, handle) = MockTransport::pair();
        handle.push(b"S:1,1".to_vec());
        handle.push(b",0\n".to_vec());

        let mut buf = [0u8; 64];
        let n = transport.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"S:1,1");
        let n = transport.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b",0\n");
    }

    #[test]
    fn test_receive_small_buffer_keeps_remainder() {
        let (mut transport, handle) = MockTransport::pair();
        handle.push(b"P:0.25\n".to_vec());

        let mut buf = [0u8; 4];
        let n = transport.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"P:0.");
        let n = transport.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"25\n");
    }

    #[test]
    fn test_timeout_close_and_error() {
        let (mut transport, handle) = MockTransport::pair();
        let mut buf = [0u8; 8];
        assert!(matches!(
            transport.receive(&mut buf),
            Err(TransportError::Timeout)
        ));

        handle.push(Vec::new());
        assert!(matches!(
            transport.receive(&mut buf),
            Err(TransportError::Timeout)
        ));

        handle.fail_read(ErrorKind::ConnectionReset);
        assert!(matches!(
            transport.receive(&mut buf),
            Err(TransportError::Io(_))
        ));

        handle.close();
        assert!(matches!(
            transport.receive(&mut buf),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_dropped_handle_reads_as_closed() {
        let (mut transport, handle) = MockTransport::pair();
        drop(handle);
        let mut buf = [0u8; 8];
        assert!(matches!(
            transport.receive(&mut buf),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_split_records_sends() {
        let (transport, handle) = MockTransport::pair();
        let (_rx, mut tx) = transport.split().unwrap();

        tx.send(b"PICK\n").unwrap();
        tx.send(b"L:0.50;R:0.50\nDROP\n").unwrap();
        assert_eq!(handle.sent_chunks().len(), 2);
        assert_eq!(handle.sent_lines(), vec!["PICK", "L:0.50;R:0.50", "DROP"]);

        handle.set_fail_sends(true);
        assert!(tx.send(b"PICK\n").is_err());
        assert_eq!(handle.sent_chunks().len(), 2);

        handle.clear_sent();
        assert!(handle.sent_lines().is_empty());
    }
}
