//! 任务配置
//!
//! 所有调参项集中在 [`MissionConfig`]，可从 TOML 加载；缺省字段取默认值。
//!
//! ```toml
//! [pid]
//! kp = 1.2
//! kd = 0.5
//!
//! [thresholds]
//! detection_m = 1.0
//! close_m = 0.2
//!
//! [timing]
//! period_ms = 20
//! ```

use crate::error::ControlError;
use crate::zone::{ColorThresholds, Zone};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// PID 增益
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// 积分累加器钳位（抗饱和）
    pub integral_limit: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 1.2,
            ki: 0.0,
            kd: 0.5,
            integral_limit: 10.0,
        }
    }
}

/// 速度参数（执行器范围 [0, max_speed]）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub base_speed: f64,
    /// 载货时的基础速度增量
    pub loaded_speed_boost: f64,
    pub max_speed: f64,
    /// 找不到线时原地转向的外侧轮速度
    pub scan_speed: f64,
    /// 前往投放区转弯阶段叠加到 PID 输出上的偏置幅度
    pub turn_bias: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            base_speed: 0.5,
            loaded_speed_boost: 0.1,
            max_speed: 1.0,
            scan_speed: 0.3,
            turn_bias: 0.4,
        }
    }
}

/// 传感器阈值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// 循迹读数低于此值视为压线
    pub line: f64,
    /// 发现箱子的距离（米）
    pub detection_m: f64,
    /// 可抓取距离（米）
    pub close_m: f64,
    pub color: ColorThresholds,
    /// 到达判定：实时颜色与抓取时样本逐通道差值上限
    pub color_match_tolerance: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            line: 0.4,
            detection_m: 1.0,
            close_m: 0.2,
            color: ColorThresholds::default(),
            color_match_tolerance: 0.1,
        }
    }
}

/// 周期与计数参数（单位：控制周期）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// 控制周期（毫秒）
    pub period_ms: u64,
    /// 遥测静默超过此时长则停车（毫秒）
    pub telemetry_timeout_ms: u64,
    /// 路口判定需连续满足的帧数
    pub node_confirm_cycles: u32,
    /// 路口处颜色无法按阈值分类时，改用主通道分类前的等待周期
    pub classify_timeout_cycles: u32,
    /// 进入投放导航后施加转向偏置的周期数
    pub turn_cycles: u32,
    /// 投放导航的兜底周期上限，超过即视为到达
    pub drop_timeout_cycles: u32,
    /// PICK/DROP 失败后的重试间隔
    pub retry_delay_cycles: u32,
    /// 连续失败达到此次数时上报一次错误（之后继续重试）
    pub max_retry_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            telemetry_timeout_ms: 500,
            node_confirm_cycles: 2,
            classify_timeout_cycles: 25,
            turn_cycles: 40,
            drop_timeout_cycles: 400,
            retry_delay_cycles: 25,
            max_retry_attempts: 5,
        }
    }
}

impl TimingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }
}

/// 任务配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// 颜色始终无法判定时使用的投放区
    pub fallback_zone: Zone,
    pub pid: PidGains,
    pub speed: SpeedConfig,
    pub thresholds: ThresholdConfig,
    pub timing: TimingConfig,
}

impl MissionConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ControlError> {
        let config: MissionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ControlError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 校验取值范围与阈值之间的关系
    pub fn validate(&self) -> Result<(), ControlError> {
        fn invalid(msg: String) -> Result<(), ControlError> {
            Err(ControlError::InvalidConfig(msg))
        }

        let finite = [
            ("pid.kp", self.pid.kp),
            ("pid.ki", self.pid.ki),
            ("pid.kd", self.pid.kd),
            ("pid.integral_limit", self.pid.integral_limit),
            ("speed.base_speed", self.speed.base_speed),
            ("speed.loaded_speed_boost", self.speed.loaded_speed_boost),
            ("speed.max_speed", self.speed.max_speed),
            ("speed.scan_speed", self.speed.scan_speed),
            ("speed.turn_bias", self.speed.turn_bias),
            ("thresholds.line", self.thresholds.line),
            ("thresholds.detection_m", self.thresholds.detection_m),
            ("thresholds.close_m", self.thresholds.close_m),
            ("thresholds.color.high", self.thresholds.color.high),
            ("thresholds.color.low", self.thresholds.color.low),
            (
                "thresholds.color_match_tolerance",
                self.thresholds.color_match_tolerance,
            ),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{} must be finite, got {}", name, value));
        }

        if self.pid.integral_limit < 0.0 {
            return invalid(format!(
                "pid.integral_limit must be >= 0, got {}",
                self.pid.integral_limit
            ));
        }
        if self.speed.max_speed <= 0.0 || self.speed.max_speed > 1.0 {
            return invalid(format!(
                "speed.max_speed must be in (0, 1], got {}",
                self.speed.max_speed
            ));
        }
        if self.speed.base_speed <= 0.0 || self.speed.base_speed > self.speed.max_speed {
            return invalid(format!(
                "speed.base_speed must be in (0, max_speed], got {}",
                self.speed.base_speed
            ));
        }
        if self.speed.loaded_speed_boost < 0.0 {
            return invalid(format!(
                "speed.loaded_speed_boost must be >= 0, got {}",
                self.speed.loaded_speed_boost
            ));
        }
        if self.speed.scan_speed <= 0.0 || self.speed.scan_speed > self.speed.max_speed {
            return invalid(format!(
                "speed.scan_speed must be in (0, max_speed], got {}",
                self.speed.scan_speed
            ));
        }
        if self.speed.turn_bias < 0.0 {
            return invalid(format!(
                "speed.turn_bias must be >= 0, got {}",
                self.speed.turn_bias
            ));
        }
        if self.thresholds.line <= 0.0 || self.thresholds.line >= 1.0 {
            return invalid(format!(
                "thresholds.line must be in (0, 1), got {}",
                self.thresholds.line
            ));
        }
        if self.thresholds.close_m <= 0.0 || self.thresholds.close_m >= self.thresholds.detection_m
        {
            return invalid(format!(
                "thresholds must satisfy 0 < close_m < detection_m, got close_m={} detection_m={}",
                self.thresholds.close_m, self.thresholds.detection_m
            ));
        }
        let color = &self.thresholds.color;
        if !(0.0 <= color.low && color.low < color.high && color.high <= 1.0) {
            return invalid(format!(
                "color thresholds must satisfy 0 <= low < high <= 1, got low={} high={}",
                color.low, color.high
            ));
        }
        if self.thresholds.color_match_tolerance < 0.0 {
            return invalid(format!(
                "thresholds.color_match_tolerance must be >= 0, got {}",
                self.thresholds.color_match_tolerance
            ));
        }
        if self.timing.period_ms == 0 {
            return invalid("timing.period_ms must be > 0".to_string());
        }
        if self.timing.telemetry_timeout_ms == 0 {
            return invalid("timing.telemetry_timeout_ms must be > 0".to_string());
        }
        if self.timing.node_confirm_cycles == 0 {
            return invalid("timing.node_confirm_cycles must be >= 1".to_string());
        }
        if self.timing.max_retry_attempts == 0 {
            return invalid("timing.max_retry_attempts must be >= 1".to_string());
        }
        if self.timing.drop_timeout_cycles <= self.timing.turn_cycles {
            return invalid(format!(
                "timing.drop_timeout_cycles ({}) must exceed timing.turn_cycles ({})",
                self.timing.drop_timeout_cycles, self.timing.turn_cycles
            ));
        }
        Ok(())
    }

    /// 序列化为 TOML（用于生成默认配置文件）
    pub fn to_toml_string(&self) -> Result<String, ControlError> {
        toml::to_string_pretty(self)
            .map_err(|e| ControlError::InvalidConfig(format!("cannot serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        MissionConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MissionConfig::from_toml_str(
            r#"
            fallback_zone = "green"

            [pid]
            kp = 0.8

            [thresholds.color]
            high = 0.6
            "#,
        )
        .unwrap();
        assert_eq!(config.pid.kp, 0.8);
        assert_eq!(config.pid.kd, PidGains::default().kd);
        assert_eq!(config.thresholds.color.high, 0.6);
        assert_eq!(config.thresholds.color.low, ColorThresholds::default().low);
        assert_eq!(config.fallback_zone, Zone::Green);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MissionConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(MissionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_inverted_proximity_thresholds() {
        let mut config = MissionConfig::default();
        config.thresholds.close_m = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ControlError::InvalidConfig(msg)) if msg.contains("close_m")
        ));
    }

    #[test]
    fn test_rejects_zero_period() {
        let result = MissionConfig::from_toml_str("[timing]\nperiod_ms = 0\n");
        assert!(matches!(result, Err(ControlError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_finite_gain() {
        let mut config = MissionConfig::default();
        config.pid.kd = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ControlError::InvalidConfig(msg)) if msg.contains("pid.kd")
        ));
    }

    #[test]
    fn test_rejects_inverted_color_thresholds() {
        let mut config = MissionConfig::default();
        config.thresholds.color.low = 0.7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let result = MissionConfig::from_toml_str("[pid\nkp = 1");
        assert!(matches!(result, Err(ControlError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.toml");
        std::fs::write(&path, "[speed]\nbase_speed = 0.35\n").unwrap();
        let config = MissionConfig::load(&path).unwrap();
        assert_eq!(config.speed.base_speed, 0.35);

        let missing = MissionConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ControlError::ConfigRead { .. })));
    }
}
