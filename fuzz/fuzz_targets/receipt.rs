#![no_main]

use libfuzzer_sys::fuzz_target;
use paylens_log_pipeline::ReceiptDecoder;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(decoder) = ReceiptDecoder::new() else {
        return;
    };
    let _ = decoder.decode_text(text);
});
