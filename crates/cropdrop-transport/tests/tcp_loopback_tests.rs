//! TCP 回环测试
//!
//! 使用本机监听 socket 验证连接、分离、收发与关闭语义。

use cropdrop_transport::{
    RxTransport, SplittableTransport, TcpTransport, Transport, TransportError, TxTransport,
};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

/// 读到至少 `want` 字节或超时
fn receive_at_least(rx: &mut impl RxTransport, want: usize) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    while out.len() < want && Instant::now() < deadline {
        match rx.receive(&mut buf) {
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(TransportError::Timeout) => continue,
            Err(e) => panic!("unexpected receive error: {}", e),
        }
    }
    out
}

#[test]
fn test_connect_split_and_exchange() {
    let (listener, addr) = listener();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"S:1,1,0,1,1;P:0.4\n").unwrap();

        let mut received = vec![0u8; 5];
        stream.read_exact(&mut received).unwrap();
        received
    });

    let transport = TcpTransport::connect(&addr, Duration::from_secs(1)).unwrap();
    assert_eq!(transport.peer_addr().to_string(), addr);

    let (mut rx, mut tx) = transport.split().unwrap();
    let inbound = receive_at_least(&mut rx, 18);
    assert_eq!(&inbound[..], b"S:1,1,0,1,1;P:0.4\n");

    tx.send(b"PICK\n").unwrap();
    assert_eq!(server.join().unwrap(), b"PICK\n");
}

#[test]
fn test_read_timeout_then_orderly_close() {
    let (listener, addr) = listener();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(50));
        drop(stream);
    });

    let mut transport = TcpTransport::connect(&addr, Duration::from_secs(1)).unwrap();
    transport.set_receive_timeout(Duration::from_millis(10));

    let mut buf = [0u8; 16];
    assert!(matches!(
        transport.receive(&mut buf),
        Err(TransportError::Timeout)
    ));

    server.join().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match transport.receive(&mut buf) {
            Err(TransportError::Closed) => break,
            Err(TransportError::Timeout) if Instant::now() < deadline => continue,
            other => panic!("expected Closed, got {:?}", other),
        }
    }
}

#[test]
fn test_connect_refused_is_connect_error() {
    // 绑定后立即释放，得到一个（大概率）无人监听的端口
    let addr = {
        let (listener, addr) = listener();
        drop(listener);
        addr
    };

    match TcpTransport::connect(&addr, Duration::from_millis(200)) {
        Err(TransportError::Connect { addr: reported, .. }) => assert_eq!(reported, addr),
        other => panic!("expected Connect error, got {:?}", other.map(|t| t.peer_addr())),
    }
}
