use evn_monitor::config::Config;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.data_dir = tmp_dir.path().to_string_lossy().to_string();
    cfg.timezone = "Asia/Bangkok".to_string();
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.data_dir, cfg.data_dir);
    assert_eq!(loaded.timezone, "Asia/Bangkok");
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    cfg.data_dir.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.web.port = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.timezone = "Not/AZone".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.trend_periods = 0;
    assert!(cfg.validate().is_err());

    // the trend endpoint caps its count at 24
    cfg.trend_periods = 30;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.logging.level = "chatty".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn accounts_fall_back_to_data_files() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("PE0600789012.json"), "{}").unwrap();
    fs::write(tmp.path().join("PE0500123456.json"), "{}").unwrap();
    fs::write(tmp.path().join("evn_billing_cycles.json"), "{}").unwrap();
    fs::write(tmp.path().join("notes.txt"), "x").unwrap();

    let mut cfg = Config::default();
    cfg.data_dir = tmp.path().to_string_lossy().to_string();
    assert_eq!(cfg.accounts().unwrap(), vec!["PE0500123456", "PE0600789012"]);

    cfg.accounts_json = "not json".to_string();
    assert!(cfg.accounts().is_err());
}

#[test]
fn today_follows_configured_timezone() {
    let cfg = Config::default();
    let tz = cfg.timezone().unwrap();
    let expected = chrono::Utc::now().with_timezone(&tz).date_naive();
    let today = cfg.today().unwrap();
    // Allow for a midnight rollover between the two reads
    assert!((today - expected).num_days().abs() <= 1);
}
