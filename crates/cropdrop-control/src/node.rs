//! 路口检测

use cropdrop_protocol::LINE_SENSOR_COUNT;

/// 5 路传感器同时压线即为路口（纯函数，无状态）
pub fn is_node(sensors: &[f64; LINE_SENSOR_COUNT], line_threshold: f64) -> bool {
    sensors.iter().all(|&v| v < line_threshold)
}

/// 带确认计数的路口检测
///
/// 谓词连续成立 `confirm_cycles` 帧才上报一次；之后锁存，直到谓词不再成立才重新武装。
/// 在路口附近读数抖动时不会重复触发。
#[derive(Debug, Clone)]
pub struct NodeDetector {
    line_threshold: f64,
    confirm_cycles: u32,
    consecutive: u32,
    latched: bool,
}

impl NodeDetector {
    pub fn new(line_threshold: f64, confirm_cycles: u32) -> Self {
        Self {
            line_threshold,
            confirm_cycles: confirm_cycles.max(1),
            consecutive: 0,
            latched: false,
        }
    }

    /// 输入一帧，返回本帧是否确认到达路口
    pub fn update(&mut self, sensors: &[f64; LINE_SENSOR_COUNT]) -> bool {
        if !is_node(sensors, self.line_threshold) {
            self.consecutive = 0;
            self.latched = false;
            return false;
        }

        self.consecutive = self.consecutive.saturating_add(1);
        if !self.latched && self.consecutive >= self.confirm_cycles {
            self.latched = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.latched = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: [f64; 5] = [0.3, 0.2, 0.1, 0.2, 0.3];
    const LINE: [f64; 5] = [1.0, 1.0, 0.1, 1.0, 1.0];

    #[test]
    fn test_node_predicate() {
        assert!(is_node(&NODE, 0.4));
        assert!(!is_node(&[0.3, 0.2, 0.1, 0.2, 0.5], 0.4));
        assert!(!is_node(&[1.0; 5], 0.4));
        // 阈值是严格小于
        assert!(!is_node(&[0.4; 5], 0.4));
    }

    #[test]
    fn test_detector_requires_confirmation() {
        let mut detector = NodeDetector::new(0.4, 2);
        assert!(!detector.update(&NODE));
        assert!(detector.update(&NODE));
    }

    #[test]
    fn test_detector_fires_once_until_cleared() {
        let mut detector = NodeDetector::new(0.4, 1);
        assert!(detector.update(&NODE));
        assert!(!detector.update(&NODE));
        assert!(!detector.update(&NODE));

        assert!(!detector.update(&LINE));
        assert!(detector.update(&NODE));
    }

    #[test]
    fn test_detector_flicker_resets_count() {
        let mut detector = NodeDetector::new(0.4, 3);
        assert!(!detector.update(&NODE));
        assert!(!detector.update(&NODE));
        assert!(!detector.update(&LINE));
        assert!(!detector.update(&NODE));
        assert!(!detector.update(&NODE));
        assert!(detector.update(&NODE));
    }

    #[test]
    fn test_zero_confirm_cycles_behaves_as_one() {
        let mut detector = NodeDetector::new(0.4, 0);
        assert!(detector.update(&NODE));
    }
}
