#![no_main]
use evn_monitor::billing::{BillingCycleConfig, enumerate_recent_periods};
use evn_monitor::readings::AccountData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(account) = AccountData::from_storage_json(text) else {
        return;
    };

    // Normalized readings are sorted, unique per day and never negative
    assert!(account.daily.windows(2).all(|w| w[0].date < w[1].date));
    assert!(account.daily.iter().all(|r| r.consumption_kwh >= 0.0));

    if let Some(last) = account.daily.last() {
        let config = BillingCycleConfig::default();
        let _ = enumerate_recent_periods(&config, &account.daily, &account.monthly, last.date, 24);
    }
});
