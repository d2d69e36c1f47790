use evn_monitor::accounts::{AccountRepository, parse_accounts};
use evn_monitor::error::EvnError;
use evn_monitor::readings::{AccountData, MonthLabel};
use std::fs;

#[test]
fn load_normalizes_dirty_rows() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("PE0500123456.json"),
        r#"{
            "daily": [
                {"Ngày": "02-03-2024", "Điện tiêu thụ (kWh)": "12,5"},
                {"Ngày": "01-03-2024", "Điện tiêu thụ (kWh)": "Không có dữ liệu"},
                {"Ngày": "not a date", "Điện tiêu thụ (kWh)": 3},
                {"Ngày": "03-03-2024", "Điện tiêu thụ (kWh)": null}
            ],
            "monthly": [
                {"Tháng": "2", "Năm": "2024", "Điện tiêu thụ (KWh)": "150", "Tiền Điện": "365.000"}
            ]
        }"#,
    )
    .unwrap();

    let repo = AccountRepository::new(tmp.path());
    let data = repo.load("PE0500123456").unwrap();

    let kwh: Vec<f64> = data.daily.iter().map(|r| r.consumption_kwh).collect();
    assert_eq!(kwh, vec![0.0, 12.5, 0.0]);
    assert_eq!(data.monthly.len(), 1);
    assert_eq!(data.monthly[0].billed_cost_vnd, 365_000);
    assert_eq!(data.monthly[0].label(), Some(MonthLabel::new(2, 2024).unwrap()));
}

#[test]
fn missing_file_is_empty_data() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = AccountRepository::new(tmp.path());
    assert!(repo.load("PE0500123456").unwrap().is_empty());
}

#[test]
fn path_traversal_is_rejected() {
    let repo = AccountRepository::new("/tmp");
    assert!(matches!(
        repo.load("../secrets"),
        Err(EvnError::Validation { .. })
    ));
}

#[test]
fn split_monthly_payload_is_merged() {
    let monthly = r#"{
        "SanLuong": [{"Tháng": 1, "Năm": 2024, "Điện tiêu thụ (KWh)": 110}],
        "TienDien": [{"Tháng": 1, "Năm": 2024, "Tiền Điện": "250.000"}]
    }"#;
    let data = AccountData::from_payloads(monthly, "[]").unwrap();
    assert_eq!(data.monthly.len(), 1);
    assert_eq!(data.monthly[0].billed_consumption_kwh, 110);
    assert_eq!(data.monthly[0].billed_cost_vnd, 250_000);
}

#[test]
fn accounts_json_shapes() {
    assert_eq!(
        parse_accounts(r#"[{"userevn": "PE1"}, {"userevn": "PE2"}]"#).unwrap(),
        vec!["PE1", "PE2"]
    );
    assert!(matches!(
        parse_accounts("[1, 2]"),
        Err(EvnError::Config { .. })
    ));
}
