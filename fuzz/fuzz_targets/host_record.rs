#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use paylens_core::types::{RecordCategory, TreeFilter};
use paylens_log_pipeline::{HostRecordDecoder, LabelLookup};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    text: String,
    category: u8,
    field: Option<String>,
    value: Option<String>,
}

fuzz_target!(|input: FuzzInput| {
    let decoder = HostRecordDecoder::new(Arc::new(LabelLookup::new()));
    let Ok(mut record) = decoder.decode_text(&input.text) else {
        return;
    };

    let category = RecordCategory::ALL[usize::from(input.category) % RecordCategory::ALL.len()];
    let filter = TreeFilter::new(category, input.field, input.value);

    // 필터는 강조만 바꾸고 트리 모양은 바꾸지 않아야 한다
    let nodes = record.root.node_count();
    decoder.rebuild(&mut record, Some(&filter));
    assert_eq!(record.root.node_count(), nodes);
    assert!(record.root.matching_count() <= nodes);
});
