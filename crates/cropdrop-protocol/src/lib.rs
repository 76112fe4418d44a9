//! # CropDrop Protocol
//!
//! 仿真器文本协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `framer`: 按 `\n` 重组字节流为完整行
//! - `record`: 入站遥测记录解析（`S:` / `P:` / `C:` 字段）
//! - `decoder`: 字节流 → 遥测记录（framer + parser 组合）
//! - `command`: 出站执行器命令编码（`L:..;R:..` / `PICK` / `DROP`）
//!
//! ## 线格式
//!
//! ```text
//! 入站（仿真器 → 控制器）:  S:v1,v2,v3,v4,v5;P:distance;C:r,g,b\n
//! 出站（控制器 → 仿真器）:  L:<float>;R:<float>\n | PICK\n | DROP\n
//! ```
//!
//! 所有入站字段均可选，`\n` 恰好结束一条记录。

pub mod command;
pub mod decoder;
pub mod framer;
pub mod record;

// 重新导出常用类型
pub use command::*;
pub use decoder::TelemetryDecoder;
pub use framer::{DEFAULT_MAX_LINE_LEN, LineFramer};
pub use record::*;

use thiserror::Error;

/// 协议错误类型
///
/// 入站遥测的数值错误不会产生此错误（宽松解析，按 0.0 处理），
/// 这里只覆盖出站命令的编码/解码。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Non-finite value for {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid number for {field}: {text:?}")]
    InvalidNumber { field: &'static str, text: String },
}
