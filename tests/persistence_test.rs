use evn_monitor::billing::{BillingCycleConfig, CycleKind};
use evn_monitor::error::EvnError;
use evn_monitor::persistence::BillingCycleStore;
use std::fs;

#[test]
fn unknown_account_defaults_to_calendar() {
    let store = BillingCycleStore::in_memory();
    assert_eq!(store.get("PE0500123456"), BillingCycleConfig::calendar());
    assert!(!store.contains("PE0500123456"));
}

#[test]
fn set_save_load_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("cycles.json");

    let mut store = BillingCycleStore::new(&path);
    store
        .set_billing_cycle("PE0500123456", 15, CycleKind::Custom)
        .unwrap();
    store
        .set_billing_cycle("PE0600789012", 1, CycleKind::Calendar)
        .unwrap();

    let mut reloaded = BillingCycleStore::new(&path);
    reloaded.load().unwrap();
    assert_eq!(
        reloaded.get("PE0500123456"),
        BillingCycleConfig::custom(15).unwrap()
    );
    assert_eq!(reloaded.entries().count(), 2);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["PE0500123456"]["startDay"], 15);
    assert_eq!(raw["PE0500123456"]["type"], "cycle");
}

#[test]
fn out_of_range_start_day_keeps_previous_config() {
    let mut store = BillingCycleStore::in_memory();
    store
        .set_billing_cycle("PE0500123456", 10, CycleKind::Custom)
        .unwrap();

    for bad in [0, 29, 31] {
        let err = store
            .set_billing_cycle("PE0500123456", bad, CycleKind::Custom)
            .unwrap_err();
        assert!(matches!(err, EvnError::Config { .. }));
    }
    assert_eq!(store.get("PE0500123456").start_day, 10);
}

#[test]
fn latest_write_wins() {
    let mut store = BillingCycleStore::in_memory();
    store.set_billing_cycle("PE1", 5, CycleKind::Custom).unwrap();
    store.set_billing_cycle("PE1", 20, CycleKind::Custom).unwrap();
    assert_eq!(store.get("PE1").start_day, 20);
}

#[test]
fn failed_save_restores_previous_entry() {
    let tmp = tempfile::tempdir().unwrap();
    // A directory in place of the file makes every write fail
    let path = tmp.path().join("cycles.json");
    fs::create_dir(&path).unwrap();

    let mut store = BillingCycleStore::new(&path);
    let err = store
        .set_billing_cycle("PE1", 12, CycleKind::Custom)
        .unwrap_err();
    assert!(matches!(err, EvnError::Io { .. }));
    assert!(!store.contains("PE1"));
}

#[test]
fn load_skips_invalid_entries() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        r#"{"PE1": {"startDay": 15, "type": "cycle"}, "PE2": {"startDay": 30, "type": "cycle"}}"#,
    )
    .unwrap();

    let mut store = BillingCycleStore::new(tmp.path());
    store.load().unwrap();
    assert!(store.contains("PE1"));
    assert!(!store.contains("PE2"));
}

#[test]
fn load_missing_file_is_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let mut store = BillingCycleStore::new(tmp.path().join("absent.json"));
    store.load().unwrap();
    assert_eq!(store.entries().count(), 0);
}
