#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use paylens_core::types::IccData;
use paylens_log_pipeline::{TagMode, TlvDecoder};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// BER 태그 모드 사용 여부
    ber: bool,
    /// hex로 바꿔서 넣을 원본 바이트
    bytes: Vec<u8>,
    /// 홀수 길이 입력을 만들기 위한 잘림
    truncate: bool,
}

fuzz_target!(|input: FuzzInput| {
    let mode = if input.ber {
        TagMode::Ber
    } else {
        TagMode::SingleExtension
    };
    let decoder = TlvDecoder::new(mode, 32);

    let mut hex: String = input.bytes.iter().map(|b| format!("{b:02X}")).collect();
    if input.truncate {
        hex.pop();
    }

    // 실패는 Fault로 국한되어야 한다
    if let IccData::Decoded { nodes, .. } = decoder.decode_icc(&hex) {
        for node in &nodes {
            assert_eq!(node.length * 2, node.value.len());
        }
    }
});
