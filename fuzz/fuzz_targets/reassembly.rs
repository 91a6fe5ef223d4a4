#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use paylens_core::types::LogLine;
use paylens_log_pipeline::{LabelLookup, MessageDecoder, Reassembler, TlvDecoder};

/// 실제 캡처에 나오는 태그 중 하나를 고르게 해서 재조립 경로에 닿도록 함
const TAGS: [&str; 4] = ["IsoMessage", "APP_CMD_PROXY", "PrinterImpl", "ActivityManager"];

#[derive(Arbitrary, Debug)]
struct FuzzLine {
    tag: u8,
    message: String,
}

fuzz_target!(|lines: Vec<FuzzLine>| {
    let Ok(mut decoder) = MessageDecoder::new(
        vec!["packRequest".to_owned(), "unpackResponse".to_owned()],
        TlvDecoder::default(),
        Arc::new(LabelLookup::new()),
    ) else {
        return;
    };
    let mut reassembler = Reassembler::default();

    for line in lines {
        let line = LogLine {
            date: "01-15".to_owned(),
            time: "12:00:00.000".to_owned(),
            pid: "1".to_owned(),
            tid: "1".to_owned(),
            level: "D".to_owned(),
            tag: TAGS[usize::from(line.tag) % TAGS.len()].to_owned(),
            message: line.message,
        };
        if let Some(message) = reassembler.feed(&line) {
            assert!(!message.lines.is_empty());
            let _ = decoder.decode(&message);
        }
    }

    if let Some(message) = reassembler.finalize() {
        let _ = decoder.decode(&message);
    }
    assert!(!reassembler.is_capturing());
});
