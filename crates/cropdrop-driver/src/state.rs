//! 共享遥测状态
//!
//! RX 线程是 [`SensorSnapshot`] 的唯一写者：每应用一条记录就整体替换一次
//! （`ArcSwap::store`），控制循环任意时刻 `load()` 到的都是某条记录应用后的完整状态，
//! 不会出现半更新。

use crate::heartbeat::{ConnectionMonitor, monotonic_micros};
use arc_swap::ArcSwap;
use cropdrop_protocol::{COLOR_CHANNEL_COUNT, LINE_SENSOR_COUNT, SensorField, SensorRecord};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 颜色传感器读数（各通道 [0, 1]）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f64; COLOR_CHANNEL_COUNT] {
        [self.r, self.g, self.b]
    }

    pub fn from_array([r, g, b]: [f64; COLOR_CHANNEL_COUNT]) -> Self {
        Self { r, g, b }
    }
}

/// 最近一次完整解析的遥测
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// 循迹传感器 {左角, 左, 中, 右, 右角}，越小越接近黑线
    ///
    /// 初始为 1.0（未见线），新会话不会被误判为路口。
    pub line_sensors: [f64; LINE_SENSOR_COUNT],
    /// 接近传感器距离（米），收到 `P:` 字段前为 `None`
    pub proximity_m: Option<f64>,
    pub color: Rgb,
    /// 已应用的记录数，0 表示尚无遥测
    pub sequence: u64,
    /// 应用该记录时的单调时间戳（微秒）
    pub system_timestamp_us: u64,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            line_sensors: [1.0; LINE_SENSOR_COUNT],
            proximity_m: None,
            color: Rgb::default(),
            sequence: 0,
            system_timestamp_us: 0,
        }
    }
}

impl SensorSnapshot {
    /// 按记录内字段顺序原地更新（同名字段后者覆盖前者）
    ///
    /// 只修改数值，不改变 `sequence`/时间戳。
    pub fn apply(&mut self, record: &SensorRecord) {
        for field in record.fields() {
            match field {
                SensorField::Line(values) => values.apply_to(&mut self.line_sensors),
                SensorField::Proximity(distance) => self.proximity_m = Some(*distance),
                SensorField::Color(values) => {
                    let mut channels = self.color.to_array();
                    values.apply_to(&mut channels);
                    self.color = Rgb::from_array(channels);
                },
            }
        }
    }

    /// 是否已收到过至少一条记录
    pub fn has_telemetry(&self) -> bool {
        self.sequence > 0
    }

    /// 数据年龄（相对当前单调时间）
    pub fn age(&self) -> Duration {
        Duration::from_micros(monotonic_micros().saturating_sub(self.system_timestamp_us))
    }
}

/// 只读遥测来源
///
/// 控制层只依赖此 trait，测试可替换为脚本化实现。
pub trait SensorSource {
    /// 当前快照（无锁）
    fn snapshot(&self) -> Arc<SensorSnapshot>;

    /// 连接是否仍然可用
    fn is_connected(&self) -> bool;
}

/// 驱动共享上下文
#[derive(Debug)]
pub struct DriverContext {
    snapshot: ArcSwap<SensorSnapshot>,
    connected: AtomicBool,
    pub connection_monitor: ConnectionMonitor,
}

impl DriverContext {
    /// `feedback_timeout`: 遥测静默多久视为过期
    pub fn new(feedback_timeout: Duration) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(SensorSnapshot::default()),
            connected: AtomicBool::new(true),
            connection_monitor: ConnectionMonitor::new(feedback_timeout),
        }
    }

    /// 整体发布新快照（仅 RX 线程调用）
    pub fn publish(&self, snapshot: SensorSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
        self.connection_monitor.register_feedback();
    }

    pub fn load(&self) -> Arc<SensorSnapshot> {
        self.snapshot.load_full()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// 标记连接丢失（不可逆，无重连）
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl SensorSource for DriverContext {
    fn snapshot(&self) -> Arc<SensorSnapshot> {
        self.load()
    }

    fn is_connected(&self) -> bool {
        DriverContext::is_connected(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropdrop_protocol::parse_record;

    #[test]
    fn test_initial_snapshot_is_not_a_node() {
        let snapshot = SensorSnapshot::default();
        assert_eq!(snapshot.line_sensors, [1.0; 5]);
        assert_eq!(snapshot.proximity_m, None);
        assert_eq!(snapshot.color, Rgb::default());
        assert!(!snapshot.has_telemetry());
    }

    #[test]
    fn test_partial_line_update_keeps_tail() {
        let mut snapshot = SensorSnapshot::default();
        snapshot.apply(&parse_record("S:0.1,0.2,0.3,0.4,0.5").unwrap());
        snapshot.apply(&parse_record("S:0.9,0.8").unwrap());
        assert_eq!(snapshot.line_sensors, [0.9, 0.8, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_partial_color_update_keeps_tail() {
        let mut snapshot = SensorSnapshot::default();
        snapshot.apply(&parse_record("C:0.2,0.4,0.6").unwrap());
        snapshot.apply(&parse_record("C:0.9").unwrap());
        assert_eq!(snapshot.color, Rgb::new(0.9, 0.4, 0.6));
    }

    #[test]
    fn test_record_without_color_keeps_previous_color() {
        let mut snapshot = SensorSnapshot::default();
        snapshot.apply(&parse_record("C:0.2,0.4,0.6").unwrap());
        snapshot.apply(&parse_record("S:0.1,0.1,0.1,0.1,0.1;P:0.5").unwrap());
        assert_eq!(snapshot.color, Rgb::new(0.2, 0.4, 0.6));
        assert_eq!(snapshot.line_sensors, [0.1; 5]);
        assert_eq!(snapshot.proximity_m, Some(0.5));
    }

    #[test]
    fn test_proximity_zero_is_distinct_from_absent() {
        let mut snapshot = SensorSnapshot::default();
        snapshot.apply(&parse_record("S:1,1,1,1,1").unwrap());
        assert_eq!(snapshot.proximity_m, None);
        snapshot.apply(&parse_record("P:0").unwrap());
        assert_eq!(snapshot.proximity_m, Some(0.0));
    }

    #[test]
    fn test_apply_keeps_sequence() {
        let mut snapshot = SensorSnapshot {
            sequence: 7,
            ..Default::default()
        };
        snapshot.apply(&parse_record("P:0.3").unwrap());
        assert_eq!(snapshot.sequence, 7);
    }

    #[test]
    fn test_context_publish_and_disconnect() {
        let ctx = DriverContext::new(Duration::from_millis(500));
        assert!(ctx.is_connected());
        assert_eq!(ctx.load().sequence, 0);

        ctx.publish(SensorSnapshot {
            sequence: 1,
            proximity_m: Some(0.5),
            ..Default::default()
        });
        let seen = SensorSource::snapshot(&ctx);
        assert_eq!(seen.sequence, 1);
        assert_eq!(seen.proximity_m, Some(0.5));

        ctx.mark_disconnected();
        assert!(!SensorSource::is_connected(&ctx));
    }
}
