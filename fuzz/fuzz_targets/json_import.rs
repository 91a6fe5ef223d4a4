#![no_main]

use libfuzzer_sys::fuzz_target;
use paylens_core::pipeline::LineParser;
use paylens_log_pipeline::JsonLineParser;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let parser = JsonLineParser::default();
        let _ = parser.import_log_lines(json);
        let _ = parser.parse(json);
    }
});
