//! 任务状态机
//!
//! ```text
//! Searching ──发现箱子──▶ Approaching ──进入抓取距离──▶ Picking ──PICK 成功──▶ NavigatingToNode
//!     ▲                        │ 箱子丢失                                            │ 路口
//!     │◀───────────────────────┘                                                     ▼
//!     │◀──DROP 成功── Dropping ◀──到达/兜底计数── NavigatingToDrop ◀──颜色分类── AtNode
//! ```
//!
//! 每次 [`MissionController::step`] 只处理一帧新遥测；状态转移只取决于当前快照与内部计数
//! （停留周期、重试次数）。任一载货状态发现货物丢失或意图不一致，都回到 `Searching`。

use crate::config::MissionConfig;
use crate::error::ControlError;
use crate::intent::RobotIntent;
use crate::node::NodeDetector;
use crate::pid::{LinePid, WheelSpeeds, line_visible};
use crate::zone;
use cropdrop_driver::{Actuator, SensorSnapshot};
use std::fmt;
use tracing::{debug, error, info, warn};

/// 控制状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlState {
    Searching,
    Approaching,
    Picking,
    NavigatingToNode,
    AtNode,
    NavigatingToDrop,
    Dropping,
}

impl ControlState {
    pub const ALL: [ControlState; 7] = [
        ControlState::Searching,
        ControlState::Approaching,
        ControlState::Picking,
        ControlState::NavigatingToNode,
        ControlState::AtNode,
        ControlState::NavigatingToDrop,
        ControlState::Dropping,
    ];

    /// 该状态下应当持有货物
    pub fn is_carrying(self) -> bool {
        matches!(
            self,
            ControlState::NavigatingToNode
                | ControlState::AtNode
                | ControlState::NavigatingToDrop
                | ControlState::Dropping
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlState::Searching => "Searching",
            ControlState::Approaching => "Approaching",
            ControlState::Picking => "Picking",
            ControlState::NavigatingToNode => "NavigatingToNode",
            ControlState::AtNode => "AtNode",
            ControlState::NavigatingToDrop => "NavigatingToDrop",
            ControlState::Dropping => "Dropping",
        }
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Pick,
    Drop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Pick => "PICK",
            Action::Drop => "DROP",
        })
    }
}

/// PICK/DROP 重试计数
///
/// 失败后冷却 `retry_delay_cycles` 个周期再试；连续失败达到上限时只上报一次。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryTracker {
    attempts: u32,
    cooldown: u32,
    escalated: bool,
}

impl RetryTracker {
    /// 当前动作的连续失败次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn escalated(&self) -> bool {
        self.escalated
    }

    /// 冷却结束返回 `true`，否则消耗一个冷却周期
    fn ready(&mut self) -> bool {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            false
        } else {
            true
        }
    }

    /// 记录一次失败；恰好达到上限时返回 `true`
    fn record_failure(&mut self, delay_cycles: u32, escalate_after: u32) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        self.cooldown = delay_cycles;
        if !self.escalated && self.attempts >= escalate_after {
            self.escalated = true;
            return true;
        }
        false
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 任务控制器
///
/// 独占控制状态与载货意图，是执行器命令的唯一产生者。
#[derive(Debug, Clone)]
pub struct MissionController {
    config: MissionConfig,
    state: ControlState,
    intent: RobotIntent,
    pid: LinePid,
    node_detector: NodeDetector,
    retry: RetryTracker,
    /// 当前状态已完成的周期数
    state_cycles: u32,
    /// 进入状态时的一次性动作（停车）是否已执行
    entry_done: bool,
    /// 最近一次看到线的方向（负为左）
    last_line_side: f64,
    box_lost: bool,
    deliveries: u64,
    transitions: u64,
    motor_rejections: u64,
}

impl MissionController {
    /// # 错误
    /// - `ControlError::InvalidConfig`: 配置校验失败
    pub fn new(config: MissionConfig) -> Result<Self, ControlError> {
        config.validate()?;

        let pid = LinePid::new()
            .with_gains(config.pid.kp, config.pid.ki, config.pid.kd)
            .with_integral_limit(config.pid.integral_limit);
        let node_detector =
            NodeDetector::new(config.thresholds.line, config.timing.node_confirm_cycles);

        Ok(Self {
            config,
            state: ControlState::Searching,
            intent: RobotIntent::default(),
            pid,
            node_detector,
            retry: RetryTracker::default(),
            state_cycles: 0,
            entry_done: false,
            last_line_side: 0.0,
            box_lost: false,
            deliveries: 0,
            transitions: 0,
            motor_rejections: 0,
        })
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn intent(&self) -> &RobotIntent {
        &self.intent
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    pub fn retry(&self) -> &RetryTracker {
        &self.retry
    }

    pub fn state_cycles(&self) -> u32 {
        self.state_cycles
    }

    /// 已完成的投放次数
    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// 被传输层拒绝的电机命令数（不中断任务）
    pub fn motor_rejections(&self) -> u64 {
        self.motor_rejections
    }

    /// 外部通知货物丢失；下一步在载货状态下回到 `Searching`
    pub fn mark_box_lost(&mut self) {
        self.box_lost = true;
    }

    /// 处理一帧遥测
    ///
    /// # 错误
    /// - `ControlError::ConnectionLost`: 执行器报告连接已断开（不再发送任何命令）
    pub fn step<A>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<ControlState, ControlError>
    where
        A: Actuator + ?Sized,
    {
        if let Some(recovery) = self.check_cargo() {
            self.transition(recovery);
            return Ok(self.state);
        }

        let next = match self.state {
            ControlState::Searching => self.searching(snapshot, actuator)?,
            ControlState::Approaching => self.approaching(snapshot, actuator)?,
            ControlState::Picking => self.picking(snapshot, actuator)?,
            ControlState::NavigatingToNode => self.navigating_to_node(snapshot, actuator)?,
            ControlState::AtNode => self.at_node(snapshot, actuator)?,
            ControlState::NavigatingToDrop => self.navigating_to_drop(snapshot, actuator)?,
            ControlState::Dropping => self.dropping(actuator)?,
        };

        match next {
            Some(next) => self.transition(next),
            None => self.state_cycles = self.state_cycles.saturating_add(1),
        }
        Ok(self.state)
    }

    /// 载货状态的一致性检查
    fn check_cargo(&mut self) -> Option<ControlState> {
        let lost = std::mem::take(&mut self.box_lost);
        if !self.state.is_carrying() {
            return None;
        }

        if lost {
            warn!("Box lost while {}, returning to search", self.state);
            self.intent.clear();
            return Some(ControlState::Searching);
        }

        let consistent = match self.state {
            ControlState::NavigatingToDrop | ControlState::Dropping => {
                self.intent.has_box() && self.intent.target_zone().is_some()
            },
            _ => self.intent.has_box(),
        };
        if !consistent {
            error!(
                "Inconsistent intent {:?} in state {}, resetting to Searching",
                self.intent, self.state
            );
            self.intent.clear();
            return Some(ControlState::Searching);
        }
        None
    }

    fn transition(&mut self, next: ControlState) {
        if next == self.state {
            return;
        }
        info!(
            "State {} -> {} after {} cycles",
            self.state, next, self.state_cycles
        );
        self.state = next;
        self.state_cycles = 0;
        self.entry_done = false;
        self.retry.reset();
        self.pid.reset();
        self.transitions += 1;
        if next == ControlState::NavigatingToNode {
            self.node_detector.reset();
        }
    }

    fn searching<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        if let Some(distance) = valid_distance(snapshot.proximity_m)
            && distance < self.config.thresholds.detection_m
        {
            info!("Box detected at {:.3} m", distance);
            return Ok(Some(ControlState::Approaching));
        }

        if line_visible(&snapshot.line_sensors, self.config.thresholds.line) {
            self.follow_line(snapshot, actuator, 0.0)?;
        } else {
            self.scan(actuator)?;
        }
        Ok(None)
    }

    fn approaching<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        let close_m = self.config.thresholds.close_m;
        let detection_m = self.config.thresholds.detection_m;
        match valid_distance(snapshot.proximity_m) {
            Some(distance) if distance < close_m => {
                debug!("Box within pick range ({:.3} m)", distance);
                Ok(Some(ControlState::Picking))
            },
            Some(distance) if distance < detection_m => {
                let base = self.config.speed.base_speed;
                self.drive(actuator, WheelSpeeds::new(base, base))?;
                Ok(None)
            },
            other => {
                info!("Box lost during approach (proximity {:?})", other);
                Ok(Some(ControlState::Searching))
            },
        }
    }

    fn picking<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        if !self.entry_done {
            self.entry_done = true;
            self.drive(actuator, WheelSpeeds::STOP)?;
        }
        if !self.retry.ready() {
            return Ok(None);
        }

        if self.issue(Action::Pick, actuator)? {
            self.intent.load(snapshot.color);
            info!(
                "Picked box, color sample ({:.2}, {:.2}, {:.2})",
                snapshot.color.r, snapshot.color.g, snapshot.color.b
            );
            return Ok(Some(ControlState::NavigatingToNode));
        }
        Ok(None)
    }

    fn navigating_to_node<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        self.follow_line(snapshot, actuator, 0.0)?;
        if self.node_detector.update(&snapshot.line_sensors) {
            info!("Reached decision node");
            return Ok(Some(ControlState::AtNode));
        }
        Ok(None)
    }

    fn at_node<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        if !self.entry_done {
            self.entry_done = true;
            self.drive(actuator, WheelSpeeds::STOP)?;
        }

        let thresholds = &self.config.thresholds.color;
        let sample = self.intent.sample();
        let mut resolved = sample
            .and_then(|s| zone::classify(s, thresholds))
            .or_else(|| zone::classify(snapshot.color, thresholds));

        if resolved.is_none() && self.state_cycles >= self.config.timing.classify_timeout_cycles {
            resolved = sample
                .and_then(zone::dominant)
                .or_else(|| zone::dominant(snapshot.color));
            match resolved {
                Some(zone) => warn!(
                    "Color unresolved after {} cycles, using dominant channel: {}",
                    self.state_cycles, zone
                ),
                None => {
                    warn!(
                        "Color unresolved after {} cycles and no dominant channel, using {}",
                        self.state_cycles, self.config.fallback_zone
                    );
                    resolved = Some(self.config.fallback_zone);
                },
            }
        }

        let Some(zone) = resolved else {
            return Ok(None);
        };
        self.intent.assign_zone(zone);
        info!("Routing box to {} zone ({:?})", zone, zone.turn());
        Ok(Some(ControlState::NavigatingToDrop))
    }

    fn navigating_to_drop<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        let Some(target) = self.intent.target_zone() else {
            return Ok(Some(ControlState::Searching));
        };
        let turning = self.state_cycles < self.config.timing.turn_cycles;
        let bias = if turning {
            target.turn().sign() * self.config.speed.turn_bias
        } else {
            0.0
        };
        self.follow_line(snapshot, actuator, bias)?;

        if self.state_cycles >= self.config.timing.drop_timeout_cycles {
            info!(
                "Assuming {} zone reached after {} cycles",
                target, self.state_cycles
            );
            return Ok(Some(ControlState::Dropping));
        }

        if !turning {
            let thresholds = &self.config.thresholds;
            let live = snapshot.color;
            let arrived = zone::classify(live, &thresholds.color) == Some(target)
                || self
                    .intent
                    .sample()
                    .is_some_and(|s| zone::matches_sample(live, s, thresholds.color_match_tolerance));
            if arrived {
                info!("{} zone confirmed by color sensor", target);
                return Ok(Some(ControlState::Dropping));
            }
        }
        Ok(None)
    }

    fn dropping<A: Actuator + ?Sized>(
        &mut self,
        actuator: &A,
    ) -> Result<Option<ControlState>, ControlError> {
        if !self.entry_done {
            self.entry_done = true;
            self.drive(actuator, WheelSpeeds::STOP)?;
        }
        if !self.retry.ready() {
            return Ok(None);
        }

        if self.issue(Action::Drop, actuator)? {
            let zone = self.intent.target_zone();
            self.intent.clear();
            self.deliveries += 1;
            info!(
                "Delivered box to {} zone (total {})",
                zone.unwrap_or(self.config.fallback_zone),
                self.deliveries
            );
            return Ok(Some(ControlState::Searching));
        }
        Ok(None)
    }

    /// 循迹：PID 修正 + 额外偏置
    fn follow_line<A: Actuator + ?Sized>(
        &mut self,
        snapshot: &SensorSnapshot,
        actuator: &A,
        bias: f64,
    ) -> Result<(), ControlError> {
        let correction = self.pid.update_from_sensors(&snapshot.line_sensors) + bias;
        let error = self.pid.last_error();
        if error != 0.0 {
            self.last_line_side = error.signum();
        }

        let speed = &self.config.speed;
        let base = if self.intent.has_box() {
            speed.base_speed + speed.loaded_speed_boost
        } else {
            speed.base_speed
        };
        let speeds = WheelSpeeds::differential(base, correction, speed.max_speed);
        self.drive(actuator, speeds)
    }

    /// 看不到线时朝最后看到线的一侧原地转
    fn scan<A: Actuator + ?Sized>(&mut self, actuator: &A) -> Result<(), ControlError> {
        let s = self.config.speed.scan_speed;
        let speeds = if self.last_line_side < 0.0 {
            WheelSpeeds::new(0.0, s)
        } else {
            WheelSpeeds::new(s, 0.0)
        };
        self.drive(actuator, speeds)
    }

    fn drive<A: Actuator + ?Sized>(
        &mut self,
        actuator: &A,
        speeds: WheelSpeeds,
    ) -> Result<(), ControlError> {
        match actuator.set_motors(speeds.left, speeds.right) {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_loss() => Err(ControlError::ConnectionLost),
            Err(e) => {
                self.motor_rejections += 1;
                debug!("Motor command rejected: {}", e);
                Ok(())
            },
        }
    }

    /// 发出 PICK/DROP；返回是否被接受
    fn issue<A: Actuator + ?Sized>(
        &mut self,
        action: Action,
        actuator: &A,
    ) -> Result<bool, ControlError> {
        let result = match action {
            Action::Pick => actuator.pick(),
            Action::Drop => actuator.drop_box(),
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_connection_loss() => Err(ControlError::ConnectionLost),
            Err(e) => {
                let timing = &self.config.timing;
                let escalate = self
                    .retry
                    .record_failure(timing.retry_delay_cycles, timing.max_retry_attempts);
                warn!(
                    "{} failed (attempt {}): {}, retrying in {} cycles",
                    action,
                    self.retry.attempts(),
                    e,
                    timing.retry_delay_cycles
                );
                if escalate {
                    error!(
                        "{} failed {} times in a row; still retrying",
                        action,
                        self.retry.attempts()
                    );
                }
                Ok(false)
            },
        }
    }
}

/// 0 或缺失的接近读数都视为"无目标"
fn valid_distance(proximity: Option<f64>) -> Option<f64> {
    proximity.filter(|d| *d > 0.0)
}
