#![no_main]
use evn_monitor::readings::normalize_consumption;
use evn_monitor::tariff::compute_cost;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data).to_string();
    let kwh = normalize_consumption(&serde_json::Value::String(raw));
    assert!(kwh.is_finite() && kwh >= 0.0);

    let cost = compute_cost(kwh);
    assert!(cost.total_vnd >= cost.subtotal_vnd);
});
