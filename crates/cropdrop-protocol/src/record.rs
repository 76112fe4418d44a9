//! 遥测记录解析
//!
//! 一条记录是 `;` 分隔的字段序列，每个字段由 2 字符标签加负载组成：
//!
//! | 标签 | 负载 | 缺省策略 |
//! |------|------|----------|
//! | `S:` | 最多 5 个 `,` 分隔浮点数 | 未给出的槽位保持旧值，第 5 个之后忽略 |
//! | `P:` | 1 个浮点数（米） | - |
//! | `C:` | 最多 3 个浮点数 (r, g, b) | 未给出的通道保持旧值 |
//!
//! 未知标签忽略（前向兼容）。数值宽松解析：非法文本按 0.0 处理并计数，
//! 不会丢弃同一记录中的其它字段。

use smallvec::SmallVec;

/// 巡线传感器数量（left_corner, left, middle, right, right_corner）
pub const LINE_SENSOR_COUNT: usize = 5;

/// 颜色通道数量（r, g, b）
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// 巡线传感器字段标签
pub const TAG_LINE: &str = "S:";
/// 接近传感器字段标签
pub const TAG_PROXIMITY: &str = "P:";
/// 颜色传感器字段标签
pub const TAG_COLOR: &str = "C:";

/// 字段分隔符
pub const FIELD_SEPARATOR: char = ';';
/// 数值分隔符
pub const VALUE_SEPARATOR: char = ',';

/// 前缀部分更新的定长数值序列
///
/// 只携带实际给出的前 `len` 个值，`apply_to()` 不会触碰其余槽位。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialValues<const N: usize> {
    values: [f64; N],
    len: usize,
}

impl<const N: usize> PartialValues<N> {
    /// 从切片构造（超出 N 的部分被截断）
    pub fn from_slice(values: &[f64]) -> Self {
        let len = values.len().min(N);
        let mut fixed = [0.0; N];
        fixed[..len].copy_from_slice(&values[..len]);
        Self { values: fixed, len }
    }

    /// 实际给出的值
    pub fn values(&self) -> &[f64] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 写入目标数组的前 `len` 个槽位
    pub fn apply_to(&self, target: &mut [f64; N]) {
        target[..self.len].copy_from_slice(self.values());
    }
}

/// 单个已解析字段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorField {
    /// `S:` 巡线传感器读数（归一化反射率，越低越暗）
    Line(PartialValues<LINE_SENSOR_COUNT>),
    /// `P:` 接近传感器距离（米）
    Proximity(f64),
    /// `C:` 颜色传感器读数 (r, g, b)
    Color(PartialValues<COLOR_CHANNEL_COUNT>),
}

/// 一条完整的遥测记录
///
/// 字段按线上出现的顺序保存，重复标签按顺序应用（后者覆盖前者）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorRecord {
    fields: SmallVec<[SensorField; 3]>,
    malformed_values: u32,
    unknown_fields: u32,
}

impl SensorRecord {
    /// 按顺序排列的字段
    pub fn fields(&self) -> &[SensorField] {
        &self.fields
    }

    /// 被按 0.0 处理的非法数值个数
    pub fn malformed_values(&self) -> u32 {
        self.malformed_values
    }

    /// 被忽略的未知字段个数
    pub fn unknown_fields(&self) -> u32 {
        self.unknown_fields
    }

    /// 最后一个 `S:` 字段
    pub fn line_sensors(&self) -> Option<PartialValues<LINE_SENSOR_COUNT>> {
        self.fields.iter().rev().find_map(|f| match f {
            SensorField::Line(v) => Some(*v),
            _ => None,
        })
    }

    /// 最后一个 `P:` 字段
    pub fn proximity(&self) -> Option<f64> {
        self.fields.iter().rev().find_map(|f| match f {
            SensorField::Proximity(d) => Some(*d),
            _ => None,
        })
    }

    /// 最后一个 `C:` 字段
    pub fn color(&self) -> Option<PartialValues<COLOR_CHANNEL_COUNT>> {
        self.fields.iter().rev().find_map(|f| match f {
            SensorField::Color(v) => Some(*v),
            _ => None,
        })
    }
}

/// 解析一行遥测（不含 `\n`）
///
/// 返回 `None` 表示该行不含任何已知字段（空行、仅未知标签等），调用方不应发布新快照。
///
/// # Example
///
/// ```
/// use cropdrop_protocol::parse_record;
///
/// let record = parse_record("S:1,1,0,1,1;P:0.42;C:0.9,0.1,0.1").unwrap();
/// assert_eq!(record.proximity(), Some(0.42));
/// assert_eq!(record.line_sensors().unwrap().values(), &[1.0, 1.0, 0.0, 1.0, 1.0]);
/// ```
pub fn parse_record(line: &str) -> Option<SensorRecord> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut record = SensorRecord::default();

    for segment in line.split(FIELD_SEPARATOR) {
        if segment.is_empty() {
            continue;
        }

        if let Some(payload) = segment.strip_prefix(TAG_LINE) {
            let values = parse_list::<LINE_SENSOR_COUNT>(payload, &mut record.malformed_values);
            if !values.is_empty() {
                record.fields.push(SensorField::Line(values));
            }
        } else if let Some(payload) = segment.strip_prefix(TAG_PROXIMITY) {
            if !payload.trim().is_empty() {
                let distance = parse_lenient(payload, &mut record.malformed_values);
                record.fields.push(SensorField::Proximity(distance));
            }
        } else if let Some(payload) = segment.strip_prefix(TAG_COLOR) {
            let values = parse_list::<COLOR_CHANNEL_COUNT>(payload, &mut record.malformed_values);
            if !values.is_empty() {
                record.fields.push(SensorField::Color(values));
            }
        } else {
            record.unknown_fields += 1;
        }
    }

    if record.fields.is_empty() {
        None
    } else {
        Some(record)
    }
}

/// 宽松数值解析：失败或非有限值按 0.0 处理
fn parse_lenient(token: &str, malformed: &mut u32) -> f64 {
    match token.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            *malformed += 1;
            0.0
        },
    }
}

/// 解析逗号分隔列表，最多取前 N 个；空负载不产生任何值
///
/// 空 token（`1,,3`）占住自己的位置并记为 0.0，后续值不前移。
fn parse_list<const N: usize>(payload: &str, malformed: &mut u32) -> PartialValues<N> {
    if payload.trim().is_empty() {
        return PartialValues::from_slice(&[]);
    }

    let mut values = [0.0; N];
    let mut len = 0;
    for token in payload.split(VALUE_SEPARATOR).take(N) {
        values[len] = parse_lenient(token, malformed);
        len += 1;
    }
    PartialValues { values, len }
}
