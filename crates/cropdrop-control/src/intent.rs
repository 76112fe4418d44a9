//! 载货意图
//!
//! 字段私有，只能通过方法修改：没有货物时绝不会残留目标区或颜色样本。

use crate::zone::Zone;
use cropdrop_driver::Rgb;

/// 当前载货与投放决策
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotIntent {
    has_box: bool,
    target_zone: Option<Zone>,
    sample: Option<Rgb>,
}

impl RobotIntent {
    /// 抓取成功：记录颜色样本，目标区待路口处决定
    pub fn load(&mut self, sample: Rgb) {
        self.has_box = true;
        self.sample = Some(sample);
        self.target_zone = None;
    }

    /// 设定目标区；未载货时拒绝并返回 `false`
    pub fn assign_zone(&mut self, zone: Zone) -> bool {
        if !self.has_box {
            return false;
        }
        self.target_zone = Some(zone);
        true
    }

    /// 投放完成或货物丢失
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn has_box(&self) -> bool {
        self.has_box
    }

    pub fn target_zone(&self) -> Option<Zone> {
        self.target_zone
    }

    pub fn sample(&self) -> Option<Rgb> {
        self.sample
    }
}
