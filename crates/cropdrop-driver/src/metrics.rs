//! IO 链路计数器
//!
//! 全部使用 `Ordering::Relaxed`：计数器之间不需要同步关系，只用于监控。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动层运行指标（RX/TX 线程写，任意线程读）
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// RX 收到的原始字节数
    pub rx_bytes_total: AtomicU64,
    /// 成功应用到快照的记录数
    pub rx_records_total: AtomicU64,
    /// 空行数（仅 `\n` 或只含 `\r`）
    pub rx_lines_empty: AtomicU64,
    /// 超长丢弃的行数
    pub rx_lines_oversized: AtomicU64,
    /// 宽松解析为 0.0 的数值个数
    pub rx_malformed_values: AtomicU64,
    /// 被忽略的未知字段个数
    pub rx_unknown_fields: AtomicU64,
    /// RX 读超时次数（正常现象）
    pub rx_timeouts: AtomicU64,
    /// TX 成功写出的命令数
    pub tx_commands_total: AtomicU64,
    /// 电机邮箱被覆盖的次数
    ///
    /// 持续增长说明控制循环产生命令的速度快于 TX 线程写出速度。
    pub tx_motor_overwrites: AtomicU64,
    /// 可靠队列满而被拒绝的 PICK/DROP 次数
    pub tx_reliable_drops: AtomicU64,
    /// 等待确认超时而被撤销的 PICK/DROP 次数
    pub tx_reliable_cancelled: AtomicU64,
    /// 传输层写失败次数（不中断会话）
    pub tx_rejected: AtomicU64,
    /// RX 侧致命传输错误次数
    pub device_errors: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes_total: self.rx_bytes_total.load(Ordering::Relaxed),
            rx_records_total: self.rx_records_total.load(Ordering::Relaxed),
            rx_lines_empty: self.rx_lines_empty.load(Ordering::Relaxed),
            rx_lines_oversized: self.rx_lines_oversized.load(Ordering::Relaxed),
            rx_malformed_values: self.rx_malformed_values.load(Ordering::Relaxed),
            rx_unknown_fields: self.rx_unknown_fields.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_commands_total: self.tx_commands_total.load(Ordering::Relaxed),
            tx_motor_overwrites: self.tx_motor_overwrites.load(Ordering::Relaxed),
            tx_reliable_drops: self.tx_reliable_drops.load(Ordering::Relaxed),
            tx_reliable_cancelled: self.tx_reliable_cancelled.load(Ordering::Relaxed),
            tx_rejected: self.tx_rejected.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.rx_bytes_total,
            &self.rx_records_total,
            &self.rx_lines_empty,
            &self.rx_lines_oversized,
            &self.rx_malformed_values,
            &self.rx_unknown_fields,
            &self.rx_timeouts,
            &self.tx_commands_total,
            &self.tx_motor_overwrites,
            &self.tx_reliable_drops,
            &self.tx_reliable_cancelled,
            &self.tx_rejected,
            &self.device_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_bytes_total: u64,
    pub rx_records_total: u64,
    pub rx_lines_empty: u64,
    pub rx_lines_oversized: u64,
    pub rx_malformed_values: u64,
    pub rx_unknown_fields: u64,
    pub rx_timeouts: u64,
    pub tx_commands_total: u64,
    pub tx_motor_overwrites: u64,
    pub tx_reliable_drops: u64,
    pub tx_reliable_cancelled: u64,
    pub tx_rejected: u64,
    pub device_errors: u64,
}

impl MetricsSnapshot {
    /// 电机邮箱覆盖率（百分比），无发送时为 0.0
    pub fn overwrite_rate(&self) -> f64 {
        if self.tx_commands_total == 0 {
            return 0.0;
        }
        (self.tx_motor_overwrites as f64 / self.tx_commands_total as f64) * 100.0
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx: {} bytes, {} records ({} malformed values, {} unknown fields, {} empty, {} oversized); \
             tx: {} commands ({} overwrites, {} queue drops, {} cancelled, {} rejected); errors: {}",
            self.rx_bytes_total,
            self.rx_records_total,
            self.rx_malformed_values,
            self.rx_unknown_fields,
            self.rx_lines_empty,
            self.rx_lines_oversized,
            self.tx_commands_total,
            self.tx_motor_overwrites,
            self.tx_reliable_drops,
            self.tx_reliable_cancelled,
            self.tx_rejected,
            self.device_errors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = DriverMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_increment() {
        let metrics = Arc::new(DriverMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.rx_records_total.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().rx_records_total, 4000);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = DriverMetrics::new();
        metrics.rx_bytes_total.fetch_add(100, Ordering::Relaxed);
        metrics.tx_motor_overwrites.fetch_add(3, Ordering::Relaxed);
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_overwrite_rate() {
        let snapshot = MetricsSnapshot {
            tx_commands_total: 200,
            tx_motor_overwrites: 50,
            ..Default::default()
        };
        assert!((snapshot.overwrite_rate() - 25.0).abs() < 1e-9);
        assert_eq!(MetricsSnapshot::default().overwrite_rate(), 0.0);
    }
}
