//! 循迹 PID
//!
//! 误差由 5 路循迹传感器加权得到：
//!
//! ```text
//! 权重:      -2   -1    0   +1   +2
//! 位置:   左角   左   中   右   右角
//! 黑度 b = clamp(1 - reading, 0, 1)
//! e = Σ(w·b) / Σb        （Σb == 0 时 e = 0）
//! ```
//!
//! 线在左侧时 e < 0。轮速 `left = base + u`、`right = base - u`，
//! 因此 e < 0 使左轮减速、右轮加速，车头向线偏转。
//!
//! 积分与微分按控制周期离散计算（每周期累加一次、与上一周期误差相减）。

use cropdrop_protocol::LINE_SENSOR_COUNT;

/// 传感器位置权重（左负右正）
pub const LINE_WEIGHTS: [f64; LINE_SENSOR_COUNT] = [-2.0, -1.0, 0.0, 1.0, 2.0];

/// 单路黑度
pub fn blackness(reading: f64) -> f64 {
    (1.0 - reading).clamp(0.0, 1.0)
}

/// 加权循迹误差，范围 [-2, 2]
pub fn line_error(sensors: &[f64; LINE_SENSOR_COUNT]) -> f64 {
    let (weighted, total) = sensors
        .iter()
        .zip(LINE_WEIGHTS)
        .fold((0.0, 0.0), |(weighted, total), (&reading, weight)| {
            let b = blackness(reading);
            (weighted + weight * b, total + b)
        });

    if total > 0.0 { weighted / total } else { 0.0 }
}

/// 任一传感器低于压线阈值
pub fn line_visible(sensors: &[f64; LINE_SENSOR_COUNT], line_threshold: f64) -> bool {
    sensors.iter().any(|&v| v < line_threshold)
}

/// 左右轮速度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl WheelSpeeds {
    pub const STOP: WheelSpeeds = WheelSpeeds {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// `left = base + correction`、`right = base - correction`，钳位到 `[0, max_speed]`
    pub fn differential(base: f64, correction: f64, max_speed: f64) -> Self {
        Self {
            left: (base + correction).clamp(0.0, max_speed),
            right: (base - correction).clamp(0.0, max_speed),
        }
    }
}

/// 循迹 PID 控制器
#[derive(Debug, Clone)]
pub struct LinePid {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    last_error: f64,
    integral_limit: f64,
}

impl LinePid {
    /// 创建零增益控制器
    pub fn new() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            integral: 0.0,
            last_error: 0.0,
            integral_limit: 10.0,
        }
    }

    pub fn with_gains(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// 积分累加器钳位 `[-limit, limit]`
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = limit;
        self
    }

    /// 输入一周期误差，返回修正量
    pub fn update(&mut self, error: f64) -> f64 {
        let p_term = self.kp * error;

        self.integral = (self.integral + error).clamp(-self.integral_limit, self.integral_limit);
        let i_term = self.ki * self.integral;

        let d_term = self.kd * (error - self.last_error);
        self.last_error = error;

        p_term + i_term + d_term
    }

    /// 直接从传感器读数计算修正量
    pub fn update_from_sensors(&mut self, sensors: &[f64; LINE_SENSOR_COUNT]) -> f64 {
        self.update(line_error(sensors))
    }

    /// 清空积分与微分历史（状态切换时调用）
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }
}

impl Default for LinePid {
    fn default() -> Self {
        Self::new()
    }
}
