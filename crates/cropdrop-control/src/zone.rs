//! 投放区颜色分类

use cropdrop_driver::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 投放区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Red,
    Green,
    #[default]
    Blue,
}

/// 路口处的转向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
    Straight,
}

impl TurnDirection {
    /// 叠加到 PID 输出上的符号（`left = base + output`，负值即左转）
    pub fn sign(self) -> f64 {
        match self {
            TurnDirection::Left => -1.0,
            TurnDirection::Right => 1.0,
            TurnDirection::Straight => 0.0,
        }
    }
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Red, Zone::Green, Zone::Blue];

    /// 从决策路口到该投放区的转向
    pub fn turn(self) -> TurnDirection {
        match self {
            Zone::Green => TurnDirection::Left,
            Zone::Red => TurnDirection::Right,
            Zone::Blue => TurnDirection::Straight,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Red => "red",
            Zone::Green => "green",
            Zone::Blue => "blue",
        };
        f.write_str(name)
    }
}

/// 固定 RGB 阈值：目标通道 `>= high`，其余两通道 `<= low`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    pub high: f64,
    pub low: f64,
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            high: 0.5,
            low: 0.35,
        }
    }
}

/// 按固定阈值分类；不满足任何一种时返回 `None`
///
/// `low < high` 时三条规则互斥，结果唯一。
pub fn classify(color: Rgb, thresholds: &ColorThresholds) -> Option<Zone> {
    let high = |v: f64| v >= thresholds.high;
    let low = |v: f64| v <= thresholds.low;

    if high(color.r) && low(color.g) && low(color.b) {
        Some(Zone::Red)
    } else if high(color.g) && low(color.r) && low(color.b) {
        Some(Zone::Green)
    } else if high(color.b) && low(color.r) && low(color.g) {
        Some(Zone::Blue)
    } else {
        None
    }
}

/// 主通道分类：严格最大的通道胜出，并列或全零时返回 `None`
pub fn dominant(color: Rgb) -> Option<Zone> {
    let Rgb { r, g, b } = color;
    if r > g && r > b {
        Some(Zone::Red)
    } else if g > r && g > b {
        Some(Zone::Green)
    } else if b > r && b > g {
        Some(Zone::Blue)
    } else {
        None
    }
}

/// 两次颜色读数逐通道差值均小于 `tolerance`
pub fn matches_sample(live: Rgb, sample: Rgb, tolerance: f64) -> bool {
    live.to_array()
        .iter()
        .zip(sample.to_array())
        .all(|(a, b)| (a - b).abs() < tolerance)
}
