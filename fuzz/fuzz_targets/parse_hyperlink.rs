#![no_main]

use libfuzzer_sys::fuzz_target;
use roseingrave_core::sheet::hyperlink::{hyperlink, parse_hyperlink};

fuzz_target!(|data: &[u8]| {
    let Ok(cell) = std::str::from_utf8(data) else {
        return;
    };
    if let Some((link, text)) = parse_hyperlink(cell) {
        let _ = hyperlink(&text, Some(&link));
    }
});
