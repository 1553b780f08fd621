#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use roseingrave_core::{Assign, Leaf, Shape, reconcile};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let fields: Arc<[String]> = ["tempo".to_string(), "key".to_string()].into();
    let shape = Shape::new(fields, 8, Leaf::Text, true);

    let (_, fixed) = reconcile(&raw, &shape, Assign::Overwrite);
    assert_eq!(fixed.len(), shape.keys().count());
    assert!(shape.keys().all(|key| fixed.contains_key(key)));
    let bars = fixed["bars"].as_object().expect("bars is an object");
    assert_eq!(bars.len(), 8);

    let (_, aggregated) = reconcile(&raw, &shape, Assign::Aggregate { contributor: "a@x" });
    assert!(aggregated.values().all(Value::is_object));
});
