//! 行重组器
//!
//! TCP 是字节流，没有长度前缀：一次读取可能包含半条记录、多条记录，或者什么都没有。
//! `LineFramer` 持有上一个 `\n` 之后的残余字节，跨多次 `feed()` 调用拼接完整行。
//!
//! # 不变量
//!
//! 对任意字节序列，无论如何切分后逐段喂入，输出的行序列都与一次性喂入完全相同。
//! 超长行（超过 `max_line_len`）整行丢弃，从下一个 `\n` 重新同步，该行为同样与切分方式无关。

use bytes::{Bytes, BytesMut};
use smallvec::SmallVec;

/// 默认最大行长度（字节，不含 `\n`）
pub const DEFAULT_MAX_LINE_LEN: usize = 2048;

/// 单次 `feed()` 产出的行列表（多数情况下 0~2 行，避免堆分配）
pub type Lines = SmallVec<[Bytes; 4]>;

/// 按 `\n` 分帧的行重组器
#[derive(Debug)]
pub struct LineFramer {
    /// 自上一个分隔符以来累积的字节
    buf: BytesMut,
    /// 最大行长度
    max_line_len: usize,
    /// 当前行已超长，丢弃直到下一个 `\n`
    discarding: bool,
    /// 被丢弃的超长行数
    oversized_lines: u64,
}

impl LineFramer {
    /// 使用默认最大行长度创建
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    /// 指定最大行长度创建
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_line_len.min(DEFAULT_MAX_LINE_LEN)),
            max_line_len,
            discarding: false,
            oversized_lines: 0,
        }
    }

    /// 喂入一段原始字节，返回其中完成的所有行（不含 `\n`）
    ///
    /// 空输入是合法的 no-op。
    pub fn feed(&mut self, data: &[u8]) -> Lines {
        let mut lines = Lines::new();
        let mut rest = data;

        while !rest.is_empty() {
            match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.push_partial(&rest[..pos]);
                    if self.discarding {
                        self.discarding = false;
                        self.oversized_lines += 1;
                    } else {
                        lines.push(self.buf.split().freeze());
                    }
                    rest = &rest[pos + 1..];
                },
                None => {
                    self.push_partial(rest);
                    break;
                },
            }
        }

        lines
    }

    fn push_partial(&mut self, bytes: &[u8]) {
        if self.discarding {
            return;
        }
        if self.buf.len() + bytes.len() > self.max_line_len {
            self.buf.clear();
            self.discarding = true;
            return;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// 当前缓存的残余字节数（尚未遇到 `\n`）
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// 累计丢弃的超长行数
    pub fn oversized_lines(&self) -> u64 {
        self.oversized_lines
    }

    /// 丢弃残余字节（连接重建时使用）
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
