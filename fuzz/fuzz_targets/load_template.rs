#![no_main]

use libfuzzer_sys::fuzz_target;
use roseingrave_core::load_template;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = serde_json::from_slice::<Value>(data) {
        let _ = load_template(&raw);
    }
});
