//! 控制律与状态机属性测试

use cropdrop_control::pid::WheelSpeeds;
use cropdrop_control::zone::dominant;
use cropdrop_control::{ColorThresholds, MissionConfig, MissionController, classify, line_error};
use cropdrop_driver::{Actuator, DriverError, Rgb, SensorSnapshot};
use proptest::prelude::*;

fn sensors() -> impl Strategy<Value = [f64; 5]> {
    prop::array::uniform5(0.0..=1.0f64)
}

fn color() -> impl Strategy<Value = Rgb> {
    (0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64).prop_map(|(r, g, b)| Rgb::new(r, g, b))
}

/// 随机拒绝动作的执行器；失败模式由帧数据决定，保持可复现
struct FlakyActuator {
    fail: std::cell::Cell<bool>,
}

impl Actuator for FlakyActuator {
    fn set_motors(&self, left: f64, right: f64) -> Result<(), DriverError> {
        assert!((0.0..=1.0).contains(&left) && (0.0..=1.0).contains(&right));
        Ok(())
    }

    fn pick(&self) -> Result<(), DriverError> {
        if self.fail.get() { Err(DriverError::Timeout) } else { Ok(()) }
    }

    fn drop_box(&self) -> Result<(), DriverError> {
        if self.fail.get() { Err(DriverError::Timeout) } else { Ok(()) }
    }
}

proptest! {
    /// 测试误差范围与左右镜像反号
    #[test]
    fn line_error_is_bounded_and_antisymmetric(s in sensors()) {
        let e = line_error(&s);
        prop_assert!((-2.0..=2.0).contains(&e));

        let mut mirrored = s;
        mirrored.reverse();
        prop_assert!((line_error(&mirrored) + e).abs() < 1e-9);
    }

    /// 测试差速输出始终在 [0, max]
    #[test]
    fn wheel_speeds_stay_in_range(
        base in 0.0..=1.0f64,
        correction in -10.0..10.0f64,
        max in 0.1..=1.0f64,
    ) {
        let w = WheelSpeeds::differential(base, correction, max);
        prop_assert!((0.0..=max).contains(&w.left));
        prop_assert!((0.0..=max).contains(&w.right));
    }

    /// 测试阈值分类成功时与主导通道一致
    #[test]
    fn classification_agrees_with_dominant_channel(c in color()) {
        if let Some(zone) = classify(c, &ColorThresholds::default()) {
            prop_assert_eq!(dominant(c), Some(zone));
        }
    }

    /// 测试任意遥测序列下载货状态与意图一致
    #[test]
    fn carrying_states_always_hold_a_box(
        frames in prop::collection::vec(
            (sensors(), prop::option::of(0.0..2.0f64), color(), any::<bool>()),
            1..200,
        ),
    ) {
        let mut config = MissionConfig::default();
        config.timing.classify_timeout_cycles = 3;
        config.timing.turn_cycles = 2;
        config.timing.drop_timeout_cycles = 5;
        config.timing.retry_delay_cycles = 1;
        let mut mc = MissionController::new(config).unwrap();
        let actuator = FlakyActuator { fail: std::cell::Cell::new(false) };

        for (i, (line, proximity, color, fail)) in frames.into_iter().enumerate() {
            actuator.fail.set(fail);
            let snapshot = SensorSnapshot {
                line_sensors: line,
                proximity_m: proximity,
                color,
                sequence: i as u64 + 1,
                system_timestamp_us: 0,
            };
            let state = mc.step(&snapshot, &actuator).unwrap();
            if state.is_carrying() {
                prop_assert!(mc.intent().has_box());
            } else {
                prop_assert!(!mc.intent().has_box());
            }
        }
    }
}
