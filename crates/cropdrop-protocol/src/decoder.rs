//! 遥测解码器
//!
//! `LineFramer` + `parse_record` 的组合：原始字节进，零或多条完整记录出。

use crate::framer::LineFramer;
use crate::record::{SensorRecord, parse_record};
use smallvec::SmallVec;

/// 单次 `feed()` 解出的记录列表
pub type Records = SmallVec<[SensorRecord; 4]>;

/// 流式遥测解码器
///
/// 独占接收缓冲区与半行重组状态。不做任何 IO，也不持有共享状态，
/// 因此可以在 RX 线程中使用，也可以在测试中直接驱动。
///
/// # Example
///
/// ```
/// use cropdrop_protocol::TelemetryDecoder;
///
/// let mut decoder = TelemetryDecoder::new();
/// assert!(decoder.feed(b"S:1,1,0,").is_empty());
/// let records = decoder.feed(b"1,1;P:0.3\n");
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].proximity(), Some(0.3));
/// ```
#[derive(Debug, Default)]
pub struct TelemetryDecoder {
    framer: LineFramer,
    /// 不含已知字段的行数
    empty_lines: u64,
}

impl TelemetryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定最大行长度
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            framer: LineFramer::with_max_line_len(max_line_len),
            empty_lines: 0,
        }
    }

    /// 喂入原始字节，返回其中完成的记录
    pub fn feed(&mut self, data: &[u8]) -> Records {
        let mut records = Records::new();
        for line in self.framer.feed(data) {
            let text = String::from_utf8_lossy(&line);
            match parse_record(&text) {
                Some(record) => records.push(record),
                None => self.empty_lines += 1,
            }
        }
        records
    }

    /// 不含已知字段而被跳过的行数
    pub fn empty_lines(&self) -> u64 {
        self.empty_lines
    }

    /// 因超长被丢弃的行数
    pub fn oversized_lines(&self) -> u64 {
        self.framer.oversized_lines()
    }

    /// 尚未遇到 `\n` 的残余字节数
    pub fn pending_len(&self) -> usize {
        self.framer.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_mixed_lines() {
        let mut decoder = TelemetryDecoder::new();
        let records = decoder.feed(b"P:1\nGARBAGE\n\nC:0.1,0.2,0.3\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].proximity(), Some(1.0));
        assert_eq!(records[1].color().unwrap().values(), &[0.1, 0.2, 0.3]);
        assert_eq!(decoder.empty_lines(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut decoder = TelemetryDecoder::new();
        let records = decoder.feed(b"P:0.5;\xff\xfe\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].proximity(), Some(0.5));
        assert_eq!(records[0].unknown_fields(), 1);
    }

    #[test]
    fn test_oversized_counted() {
        let mut decoder = TelemetryDecoder::with_max_line_len(4);
        let records = decoder.feed(b"P:123456\nP:1\n");
        assert_eq!(records.len(), 1);
        assert_eq!(decoder.oversized_lines(), 1);
    }
}
