#![no_main]

use libfuzzer_sys::fuzz_target;
use paylens_log_pipeline::LogcatParser;

fuzz_target!(|data: &[u8]| {
    let parser = LogcatParser::new().with_max_input_size(64 * 1024);
    let raw = String::from_utf8_lossy(data);

    // 크래시나 패닉 없이 Some 또는 None을 반환해야 한다
    if let Some(line) = parser.classify(&raw) {
        assert!(!line.message.is_empty());
    }
});
