//! 分帧属性测试
//!
//! 使用 proptest 验证：任意切分方式喂入同一字节流，解出的记录序列完全相同。

use cropdrop_protocol::{LineFramer, SensorRecord, TelemetryDecoder};
use proptest::prelude::*;

/// 生成一条合法或半合法的遥测行（含 `\n`）
fn record_line() -> impl Strategy<Value = String> {
    let value = prop_oneof![
        (0.0..1.0f64).prop_map(|v| format!("{:.3}", v)),
        Just("abc".to_string()),
        Just(String::new()),
    ];
    let line_field = prop::collection::vec(value.clone(), 0..7)
        .prop_map(|vs| format!("S:{}", vs.join(",")));
    let prox_field = (0.0..3.0f64).prop_map(|d| format!("P:{:.3}", d));
    let color_field =
        prop::collection::vec(value, 0..4).prop_map(|vs| format!("C:{}", vs.join(",")));
    let unknown_field = Just("X:9".to_string());

    prop::collection::vec(
        prop_oneof![line_field, prox_field, color_field, unknown_field],
        0..5,
    )
    .prop_map(|fields| format!("{}\n", fields.join(";")))
}

/// 生成字节流与切分点
fn stream_and_cuts() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    prop::collection::vec(record_line(), 0..20).prop_flat_map(|lines| {
        let bytes: Vec<u8> = lines.concat().into_bytes();
        let len = bytes.len();
        let cuts = prop::collection::vec(0..=len, 0..16);
        (Just(bytes), cuts)
    })
}

fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts = cuts.to_vec();
    cuts.sort_unstable();
    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn decode_all(chunks: &[Vec<u8>]) -> Vec<SensorRecord> {
    let mut decoder = TelemetryDecoder::new();
    chunks.iter().flat_map(|c| decoder.feed(c)).collect()
}

proptest! {
    /// 测试记录解码与切分方式无关
    #[test]
    fn decoding_is_split_invariant((bytes, cuts) in stream_and_cuts()) {
        let whole = decode_all(&[bytes.clone()]);
        let pieces = decode_all(&split_at_cuts(&bytes, &cuts));
        prop_assert_eq!(whole, pieces);
    }

    /// 测试超长行丢弃同样与切分方式无关
    #[test]
    fn oversized_discard_is_split_invariant(
        (bytes, cuts) in stream_and_cuts(),
        max_len in 1usize..40,
    ) {
        let mut whole = LineFramer::with_max_line_len(max_len);
        let whole_lines: Vec<_> = whole.feed(&bytes).into_iter().collect();

        let mut split = LineFramer::with_max_line_len(max_len);
        let split_lines: Vec<_> = split_at_cuts(&bytes, &cuts)
            .iter()
            .flat_map(|c| split.feed(c))
            .collect();

        prop_assert_eq!(whole_lines, split_lines);
        prop_assert_eq!(whole.oversized_lines(), split.oversized_lines());
    }

    /// 测试逐字节喂入与一次性喂入等价
    #[test]
    fn byte_at_a_time_matches_whole((bytes, _cuts) in stream_and_cuts()) {
        let whole = decode_all(&[bytes.clone()]);
        let singles: Vec<Vec<u8>> = bytes.iter().map(|b| vec![*b]).collect();
        prop_assert_eq!(whole, decode_all(&singles));
    }
}
