//! 会话对象：持有 RX/TX 线程、共享状态与执行器网关
//!
//! `Robot` 析构时清除运行标志并等待两个线程退出（各 2s 上限），
//! 之后 socket 两半随线程一起释放。

use crate::command::{MotorSlot, RELIABLE_QUEUE_CAPACITY, ReliableCommand};
use crate::error::DriverError;
use crate::gateway::{Actuator, ActuatorGateway};
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::pipeline::PipelineConfig;
use crate::state::{DriverContext, SensorSnapshot, SensorSource};
use cropdrop_transport::SplittableTransport;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// 线程 join 超时等待
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 与仿真器的一次会话
pub struct Robot {
    ctx: Arc<DriverContext>,
    gateway: ActuatorGateway,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<DriverMetrics>,
    peer: String,
}

impl fmt::Debug for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Robot")
            .field("peer", &self.peer)
            .field("connected", &self.is_connected())
            .field("healthy", &self.is_healthy())
            .finish_non_exhaustive()
    }
}

impl Robot {
    const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

    /// 分离传输并启动 RX/TX 线程
    ///
    /// # 错误
    /// - `DriverError::Transport`: 分离失败
    /// - `DriverError::IoThread`: 线程创建失败
    pub fn new<T>(transport: T, config: Option<PipelineConfig>) -> Result<Self, DriverError>
    where
        T: SplittableTransport + Send + 'static,
        T::Rx: Send + 'static,
        T::Tx: Send + 'static,
    {
        let config = config.unwrap_or_default();
        let (rx, tx) = transport.split()?;

        let motor_slot: MotorSlot = Arc::new(Mutex::new(None));
        let (reliable_tx, reliable_rx) =
            crossbeam_channel::bounded::<ReliableCommand>(RELIABLE_QUEUE_CAPACITY);

        let ctx = Arc::new(DriverContext::new(config.feedback_timeout()));
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(DriverMetrics::new());

        let rx_thread = {
            let (rx_ctx, rx_running, rx_metrics, rx_config) =
                (ctx.clone(), is_running.clone(), metrics.clone(), config.clone());
            std::thread::Builder::new()
                .name("cropdrop-rx".to_string())
                .spawn(move || {
                    crate::pipeline::rx_loop(rx, rx_ctx, rx_config, rx_running, rx_metrics)
                })
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };

        let tx_thread = {
            let (tx_ctx, tx_running, tx_metrics, tx_config, tx_slot) = (
                ctx.clone(),
                is_running.clone(),
                metrics.clone(),
                config.clone(),
                motor_slot.clone(),
            );
            let spawned = std::thread::Builder::new()
                .name("cropdrop-tx".to_string())
                .spawn(move || {
                    crate::pipeline::tx_loop_mailbox(
                        tx,
                        tx_slot,
                        reliable_rx,
                        tx_ctx,
                        tx_config,
                        tx_running,
                        tx_metrics,
                    )
                });
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    // RX 线程已经在跑，先让它退出
                    is_running.store(false, Ordering::Release);
                    let _ = rx_thread.join_timeout(Self::JOIN_TIMEOUT);
                    return Err(DriverError::IoThread(e.to_string()));
                },
            }
        };

        let gateway = ActuatorGateway::new(
            motor_slot,
            reliable_tx,
            ctx.clone(),
            metrics.clone(),
            config.ack_timeout(),
        );

        Ok(Self {
            ctx,
            gateway,
            rx_thread: Some(rx_thread),
            tx_thread: Some(tx_thread),
            is_running,
            metrics,
            peer: "unknown".to_string(),
        })
    }

    pub(crate) fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// 对端描述（builder 创建时为仿真器地址）
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// 当前遥测快照（无锁）
    pub fn get_snapshot(&self) -> Arc<SensorSnapshot> {
        self.ctx.load()
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    /// 遥测是否在超时窗口内更新过
    pub fn is_telemetry_fresh(&self) -> bool {
        self.ctx.connection_monitor.check_connection()
    }

    /// RX/TX 线程存活状态
    pub fn check_health(&self) -> (bool, bool) {
        let rx_alive = self.rx_thread.as_ref().is_some_and(|h| !h.is_finished());
        let tx_alive = self.tx_thread.as_ref().is_some_and(|h| !h.is_finished());
        (rx_alive, tx_alive)
    }

    pub fn is_healthy(&self) -> bool {
        let (rx_alive, tx_alive) = self.check_health();
        rx_alive && tx_alive
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 执行器网关
    pub fn gateway(&self) -> &ActuatorGateway {
        &self.gateway
    }

    /// 共享上下文（用于在其它线程中读取快照）
    pub fn context(&self) -> Arc<DriverContext> {
        self.ctx.clone()
    }

    /// 等待第一条遥测
    ///
    /// # 错误
    /// - `DriverError::Disconnected`: 等待期间连接断开
    /// - `DriverError::Timeout`: 超时仍无遥测
    pub fn wait_for_telemetry(&self, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            if self.ctx.load().has_telemetry() {
                return Ok(());
            }
            if !self.ctx.is_connected() {
                return Err(DriverError::Disconnected);
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl SensorSource for Robot {
    fn snapshot(&self) -> Arc<SensorSnapshot> {
        self.get_snapshot()
    }

    fn is_connected(&self) -> bool {
        Robot::is_connected(self)
    }
}

impl Actuator for Robot {
    fn set_motors(&self, left: f64, right: f64) -> Result<(), DriverError> {
        self.gateway.set_motors(left, right)
    }

    fn pick(&self) -> Result<(), DriverError> {
        self.gateway.pick()
    }

    fn drop_box(&self) -> Result<(), DriverError> {
        self.gateway.drop_box()
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        debug!("Shutting down session with {}", self.peer);
        self.is_running.store(false, Ordering::Release);

        // RX 先退出：它观察到标志后才能释放读半边
        if let Some(handle) = self.rx_thread.take()
            && let Err(_e) = handle.join_timeout(Self::JOIN_TIMEOUT)
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                Self::JOIN_TIMEOUT
            );
        }

        if let Some(handle) = self.tx_thread.take()
            && let Err(_e) = handle.join_timeout(Self::JOIN_TIMEOUT)
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                Self::JOIN_TIMEOUT
            );
        }
    }
}
