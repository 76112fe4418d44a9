//! 出站执行器命令
//!
//! 无状态编码器：差速电机指令 `L:<f>;R:<f>\n`，以及固定动作 `PICK\n` / `DROP\n`。
//! 速度保留两位小数。

use crate::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// 拾取命令
pub const PICK_COMMAND: &str = "PICK";
/// 放下命令
pub const DROP_COMMAND: &str = "DROP";

/// 差速电机指令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorCommand {
    left: f64,
    right: f64,
}

impl MotorCommand {
    /// 停车
    pub const STOP: MotorCommand = MotorCommand {
        left: 0.0,
        right: 0.0,
    };

    /// 创建电机指令
    ///
    /// # 错误
    /// - `ProtocolError::NonFinite`: 速度为 NaN 或无穷大
    pub fn new(left: f64, right: f64) -> Result<Self, ProtocolError> {
        if !left.is_finite() {
            return Err(ProtocolError::NonFinite {
                field: "left",
                value: left,
            });
        }
        if !right.is_finite() {
            return Err(ProtocolError::NonFinite {
                field: "right",
                value: right,
            });
        }
        Ok(Self { left, right })
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn is_stop(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// 执行器命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    SetMotors(MotorCommand),
    Pick,
    Drop,
}

impl ActuatorCommand {
    /// 编码为线格式（含结尾 `\n`）并追加到 `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(self.to_string().as_bytes());
        dst.put_u8(b'\n');
    }

    /// 编码为独立的字节块
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(24);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// 解析一行出站命令（不含 `\n`）
    ///
    /// 控制器本身不需要解析出站命令，主要用于仿真桩和测试。
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            PICK_COMMAND => return Ok(ActuatorCommand::Pick),
            DROP_COMMAND => return Ok(ActuatorCommand::Drop),
            _ => {},
        }

        if !line.starts_with("L:") {
            return Err(ProtocolError::UnknownCommand(line.to_string()));
        }

        let mut left = None;
        let mut right = None;
        for segment in line.split(';') {
            if let Some(text) = segment.strip_prefix("L:") {
                left = Some(parse_speed("L", text)?);
            } else if let Some(text) = segment.strip_prefix("R:") {
                right = Some(parse_speed("R", text)?);
            }
        }

        let left = left.ok_or(ProtocolError::MissingField("L"))?;
        let right = right.ok_or(ProtocolError::MissingField("R"))?;
        Ok(ActuatorCommand::SetMotors(MotorCommand::new(left, right)?))
    }
}

fn parse_speed(field: &'static str, text: &str) -> Result<f64, ProtocolError> {
    text.trim().parse::<f64>().map_err(|_| ProtocolError::InvalidNumber {
        field,
        text: text.to_string(),
    })
}

/// 避免输出 `-0.00`
fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorCommand::SetMotors(m) => write!(
                f,
                "L:{:.2};R:{:.2}",
                normalize_zero(m.left),
                normalize_zero(m.right)
            ),
            ActuatorCommand::Pick => f.write_str(PICK_COMMAND),
            ActuatorCommand::Drop => f.write_str(DROP_COMMAND),
        }
    }
}

impl From<MotorCommand> for ActuatorCommand {
    fn from(m: MotorCommand) -> Self {
        ActuatorCommand::SetMotors(m)
    }
}
